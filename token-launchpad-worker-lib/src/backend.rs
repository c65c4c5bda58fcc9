//! Contracts of the external collaborators the orchestrator drives.
//!
//! Circuit compilation, transaction construction, proving and chain access
//! live outside this crate. The orchestrator only sees these traits.

use crate::error::{Error, Result};
use crate::jobs::TaskName;
use crate::types::{Address, Amount, CircuitName, Network, VerificationKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const STATUS_PENDING: &str = "pending";

const FORCED_FETCH_TIMEOUT: Duration = Duration::from_secs(120);
const FORCED_FETCH_INTERVAL: Duration = Duration::from_secs(6);

/// Constraint-system statistics of one contract method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodStats {
    pub rows: u64,
}

#[async_trait]
pub trait CircuitCompiler: Send + Sync {
    /// Compiles `circuit`, reusing artifacts under `cache_dir`.
    async fn compile(&self, circuit: CircuitName, cache_dir: &Path) -> Result<VerificationKey>;

    async fn analyze_methods(&self, circuit: CircuitName) -> Result<BTreeMap<String, MethodStats>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeeTransfer {
    pub recipient: Address,
    pub amount: Amount,
}

/// Fee, nonce and memo as carried by a serialized transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub sender: Address,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub fee: Option<Amount>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    pub address: Address,
    #[serde(default)]
    pub amount: Option<Amount>,
}

/// Kind-specific inputs for the transaction builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BuildParams {
    #[serde(rename_all = "camelCase")]
    Deploy {
        token_address: Address,
        admin_contract_address: Address,
        admin_address: Address,
        symbol: String,
        uri: String,
        decimals: u8,
        whitelist: Option<Vec<WhitelistEntry>>,
    },
    #[serde(rename_all = "camelCase")]
    Token {
        token_address: Address,
        from: Address,
        to: Address,
        amount: Amount,
        price: Option<Amount>,
    },
    #[serde(rename_all = "camelCase")]
    Whitelist {
        token_address: Address,
        contract_address: Option<Address>,
        whitelist: Vec<WhitelistEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Tiny {
        contract_address: Address,
        value: Amount,
    },
}

/// Validated parameters handed to the transaction builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub tx_type: TaskName,
    pub network: Network,
    pub sender: Address,
    pub envelope: Option<TransactionEnvelope>,
    pub serialized_transaction: Option<String>,
    pub signed_data: Option<String>,
    pub proving_fee: Option<FeeTransfer>,
    pub developer_fee: Option<FeeTransfer>,
    pub params: BuildParams,
}

/// An unsigned or partially authorized transaction plus the circuits it uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    pub tx: String,
    #[serde(default)]
    pub is_advanced: bool,
    #[serde(default)]
    pub verification_key_hashes: Vec<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[async_trait]
pub trait TransactionBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvedTransaction {
    pub tx: String,
}

#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, tx: &BuiltTransaction) -> Result<ProvedTransaction>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub status: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SendResponse {
    pub fn is_pending(&self) -> bool {
        self.status == STATUS_PENDING
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InclusionResponse {
    pub status: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub public_key: Address,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub balance: Option<Amount>,
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn send(&self, tx: &ProvedTransaction) -> Result<SendResponse>;

    /// Blocks until the transaction is included in a block.
    async fn wait(&self, hash: &str) -> Result<InclusionResponse>;

    /// `Ok(None)` when the account does not exist. With `token` set, fetches
    /// the account's balance of that token contract's token instead of the
    /// native account.
    async fn fetch_account(
        &self,
        address: &Address,
        token: Option<&Address>,
    ) -> Result<Option<AccountInfo>>;
}

#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn publish(&self, tx_id: &str, metadata: &crate::types::TransactionMetadata) -> Result<()>;
}

/// Sink used when no metadata endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetadataSink;

#[async_trait]
impl MetadataSink for NoopMetadataSink {
    async fn publish(&self, tx_id: &str, _metadata: &crate::types::TransactionMetadata) -> Result<()> {
        debug!(%tx_id, "Metadata publishing disabled");
        Ok(())
    }
}

/// Receives the request to replace this worker process.
pub trait Supervisor: Send + Sync {
    fn force_restart(&self, reason: &str);
}

/// The collaborator set an orchestrator runs against.
#[derive(Clone)]
pub struct Backends {
    pub compiler: Arc<dyn CircuitCompiler>,
    pub builder: Arc<dyn TransactionBuilder>,
    pub prover: Arc<dyn Prover>,
    pub chain: Arc<dyn ChainClient>,
    pub metadata: Arc<dyn MetadataSink>,
    pub supervisor: Arc<dyn Supervisor>,
}

/// Fetches an account, retrying transient failures.
///
/// Forced fetches are for accounts that must exist: errors are retried every
/// six seconds for up to two minutes before giving up. Unforced fetches treat
/// the first error as a missing account.
pub async fn fetch_account_with_retry(
    chain: &dyn ChainClient,
    address: &Address,
    token: Option<&Address>,
    force: bool,
) -> Result<Option<AccountInfo>> {
    let started = tokio::time::Instant::now();
    loop {
        match chain.fetch_account(address, token).await {
            Ok(account) => return Ok(account),
            Err(e) if !force => {
                debug!(%address, ?token, error = %e, "Account fetch failed, treating as absent");
                return Ok(None);
            }
            Err(e) => {
                if started.elapsed() + FORCED_FETCH_INTERVAL > FORCED_FETCH_TIMEOUT {
                    return Err(Error::Chain(format!(
                        "timed out fetching account {}: {}",
                        address, e
                    )));
                }
                warn!(%address, ?token, error = %e, "Account fetch failed, retrying");
                tokio::time::sleep(FORCED_FETCH_INTERVAL).await;
            }
        }
    }
}
