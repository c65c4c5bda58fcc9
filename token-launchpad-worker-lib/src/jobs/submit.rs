use crate::backend::{ChainClient, ProvedTransaction, SendResponse};
use crate::config::SubmitPolicy;
use crate::types::{JobResult, Network};
use serde::Serialize;
use std::fmt;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// Stages a job passes through once its input is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitState {
    Building,
    Proving,
    Submitting,
    Sent,
    Included,
    Failed,
}

impl fmt::Display for SubmitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmitState::Building => "building",
            SubmitState::Proving => "proving",
            SubmitState::Submitting => "submitting",
            SubmitState::Sent => "sent",
            SubmitState::Included => "included",
            SubmitState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal state of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub state: SubmitState,
    pub hash: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl SubmitOutcome {
    fn failed(attempts: u32, hash: Option<String>, status: Option<String>, error: String) -> Self {
        Self {
            state: SubmitState::Failed,
            hash,
            status,
            error: Some(error),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, SubmitState::Sent | SubmitState::Included)
    }

    pub fn into_job_result(self, tx: String) -> JobResult {
        JobResult {
            success: self.is_success(),
            tx: Some(tx),
            hash: self.hash,
            status: self.status,
            error: self.error,
        }
    }
}

fn rejection_message(response: &SendResponse) -> String {
    if response.errors.is_empty() {
        format!("transaction not accepted, status {}", response.status)
    } else {
        response.errors.join("; ")
    }
}

/// Sends a proved transaction and optionally waits for its inclusion.
///
/// Only a `pending` status counts as accepted. On the sidechain a rejected
/// send is retried with a fixed backoff while the elapsed time plus one more
/// backoff stays within the budget. Transport errors end the submission.
pub async fn submit(
    chain: &dyn ChainClient,
    tx: &ProvedTransaction,
    network: Network,
    policy: &SubmitPolicy,
    wait_for_inclusion: bool,
) -> SubmitOutcome {
    let started = Instant::now();
    let mut attempts = 0u32;

    let pending_hash = loop {
        attempts += 1;
        info!(state = %SubmitState::Submitting, attempt = attempts, %network, "Sending transaction");
        let response = match chain.send(tx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(attempt = attempts, error = %e, "Transaction send failed");
                return SubmitOutcome::failed(attempts, None, None, e.to_string());
            }
        };

        if response.is_pending() {
            match response.hash {
                Some(hash) => break hash,
                None => {
                    return SubmitOutcome::failed(
                        attempts,
                        None,
                        Some(response.status),
                        "chain accepted the transaction without returning a hash".to_string(),
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        if network.is_sidechain() && elapsed + policy.backoff() <= policy.sidechain_budget() {
            info!(
                attempt = attempts,
                status = %response.status,
                elapsed_secs = elapsed.as_secs(),
                "Transaction not accepted on sidechain, retrying"
            );
            sleep(policy.backoff()).await;
            continue;
        }

        warn!(
            attempt = attempts,
            hash = ?response.hash,
            status = %response.status,
            errors = ?response.errors,
            "Transaction not sent"
        );
        let error = rejection_message(&response);
        return SubmitOutcome::failed(attempts, response.hash, Some(response.status), error);
    };

    info!(state = %SubmitState::Sent, hash = %pending_hash, attempt = attempts, "Transaction sent");

    if !wait_for_inclusion {
        return SubmitOutcome {
            state: SubmitState::Sent,
            hash: Some(pending_hash),
            status: None,
            error: None,
            attempts,
        };
    }

    match chain.wait(&pending_hash).await {
        Ok(included) => {
            info!(state = %SubmitState::Included, hash = %included.hash, status = %included.status, "Transaction included");
            SubmitOutcome {
                state: SubmitState::Included,
                hash: Some(included.hash),
                status: Some(included.status),
                error: None,
                attempts,
            }
        }
        Err(e) => {
            warn!(hash = %pending_hash, error = %e, "Waiting for inclusion failed");
            SubmitOutcome::failed(
                attempts,
                Some(pending_hash),
                Some(crate::backend::STATUS_PENDING.to_string()),
                e.to_string(),
            )
        }
    }
}
