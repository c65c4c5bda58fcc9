use crate::backend::{Backends, BuiltTransaction, fetch_account_with_retry};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::jobs::submit::{self, SubmitState};
use crate::jobs::{TaskName, TaskRequest};
use crate::registry::VerificationKeyRegistry;
use crate::state::CircuitCache;
use crate::types::{CircuitName, JobResult, TransactionMetadata};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs token transaction jobs against a set of collaborators.
///
/// Cheap to clone: the circuit cache and collaborators are shared.
#[derive(Clone)]
pub struct TransactionOrchestrator {
    config: Arc<WorkerConfig>,
    registry: Arc<VerificationKeyRegistry>,
    cache: Arc<CircuitCache>,
    backends: Backends,
}

impl TransactionOrchestrator {
    pub fn new(
        config: WorkerConfig,
        registry: VerificationKeyRegistry,
        cache: Arc<CircuitCache>,
        backends: Backends,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            cache,
            backends,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn is_poisoned(&self) -> bool {
        self.cache.is_poisoned()
    }

    /// Job entry point. Returns the pretty-printed [`JobResult`].
    ///
    /// Errors are returned for bad input and circuit integrity failures only.
    /// Everything past compilation produces a result, successful or not.
    pub async fn execute(&self, task: &str, payloads: &[String]) -> Result<String> {
        let task: TaskName = task.parse()?;
        let payload = payloads
            .first()
            .ok_or_else(|| Error::InvalidInput(format!("{} job has no payload", task)))?;
        let request = TaskRequest::parse(task, payload, self.config.network)?;
        self.execute_request(request).await?.to_json()
    }

    #[instrument(skip_all, fields(task = %request.task(), sender = %request.signer()))]
    pub async fn execute_request(&self, request: TaskRequest) -> Result<JobResult> {
        if self.is_poisoned() {
            return Err(Error::WorkerPoisoned);
        }
        let chain = self.backends.chain.as_ref();

        debug!(state = %SubmitState::Building, "Fetching required accounts");
        for required in request.required_accounts() {
            let account =
                fetch_account_with_retry(chain, &required.address, required.token.as_ref(), true)
                    .await?;
            if account.is_none() {
                debug!(address = %required.address, role = required.role, "Required account missing");
                return Err(Error::Build(required.missing_message()));
            }
        }
        if fetch_account_with_retry(chain, &self.config.wallet, None, false)
            .await?
            .is_none()
        {
            debug!(wallet = %self.config.wallet, "Fee wallet account not found");
        }

        let build_request = request.build_request(&self.config);
        let built = self.backends.builder.build(&build_request).await?;
        debug!(
            is_advanced = built.is_advanced,
            referenced_keys = built.verification_key_hashes.len(),
            "Transaction built"
        );

        let circuits = self.ensure_circuits(&request, &built).await?;
        self.check_referenced_keys(&circuits, &built)?;

        info!(state = %SubmitState::Proving, "Proving transaction");
        let proved = self.backends.prover.prove(&built).await?;

        if !request.send_transaction() {
            info!("Dry run, transaction not sent");
            return Ok(JobResult {
                success: true,
                tx: Some(proved.tx),
                ..Default::default()
            });
        }

        let outcome = submit::submit(
            chain,
            &proved,
            self.config.network,
            &self.config.submit,
            self.config.wait_for_inclusion,
        )
        .await;

        if let Some(hash) = &outcome.hash {
            self.publish_metadata(hash, request.metadata(&built)).await;
        }
        info!(state = %outcome.state, attempts = outcome.attempts, hash = ?outcome.hash, "Job finished");
        Ok(outcome.into_job_result(proved.tx))
    }

    /// Compiles and verifies every circuit the request's kind depends on.
    async fn ensure_circuits(
        &self,
        request: &TaskRequest,
        built: &BuiltTransaction,
    ) -> Result<Vec<CircuitName>> {
        let network_id = self.config.network.network_id();
        let mut circuits = Vec::new();
        for role in request.circuit_roles() {
            let circuit = role.circuit(built.is_advanced);
            self.cache
                .get_or_compile(
                    circuit,
                    self.backends.compiler.as_ref(),
                    &self.registry,
                    network_id,
                    &self.config.cache_dir,
                    self.backends.supervisor.as_ref(),
                )
                .await?;
            circuits.push(circuit);
        }
        Ok(circuits)
    }

    fn check_referenced_keys(&self, circuits: &[CircuitName], built: &BuiltTransaction) -> Result<()> {
        let network_id = self.config.network.network_id();
        for hash in &built.verification_key_hashes {
            if !self.registry.pins_hash(network_id, circuits, hash) {
                let err = Error::UnpinnedVerificationKey {
                    hash: hash.clone(),
                    network: network_id,
                };
                self.cache
                    .poison(&err.to_string(), self.backends.supervisor.as_ref());
                return Err(err);
            }
        }
        Ok(())
    }

    async fn publish_metadata(&self, tx_id: &str, metadata: TransactionMetadata) {
        let publish = self.backends.metadata.publish(tx_id, &metadata);
        match tokio::time::timeout(self.config.metadata_timeout(), publish).await {
            Ok(Ok(())) => debug!(%tx_id, tx_type = %metadata.tx_type, "Metadata published"),
            Ok(Err(e)) => warn!(%tx_id, error = %e, "Metadata publish failed"),
            Err(_) => warn!(%tx_id, "Metadata publish timed out"),
        }
    }
}
