use super::Authorization;
use crate::backend::{BuildParams, TransactionEnvelope, WhitelistEntry};
use crate::error::{Error, Result};
use crate::types::{Address, Network, TransactionMetadata};
use serde::{Deserialize, Serialize};

const DEFAULT_DECIMALS: u8 = 9;
/// Token symbols are stored on chain as at most 6 UTF-8 bytes.
const MAX_SYMBOL_BYTES: usize = 6;

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

/// Launches a token contract together with its admin contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployPayload {
    /// Token owner. Signs and pays for the deployment.
    pub admin_address: Address,
    pub token_address: Address,
    pub admin_contract_address: Address,
    pub symbol: String,
    pub uri: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Initial whitelist. Deploys the advanced admin contract when present.
    #[serde(default)]
    pub whitelist: Option<Vec<WhitelistEntry>>,
    pub send_transaction: bool,
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(skip)]
    pub(crate) envelope: Option<TransactionEnvelope>,
}

impl DeployPayload {
    pub(crate) fn validate(&mut self, network: Network) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(Error::missing("symbol"));
        }
        if self.symbol.len() > MAX_SYMBOL_BYTES {
            return Err(Error::InvalidInput(format!(
                "symbol {} is longer than {} bytes",
                self.symbol, MAX_SYMBOL_BYTES
            )));
        }
        if self.uri.is_empty() {
            return Err(Error::missing("uri"));
        }
        if self.token_address == self.admin_contract_address {
            return Err(Error::InvalidInput(
                "tokenAddress and adminContractAddress must differ".to_string(),
            ));
        }
        self.envelope = self.auth.validate(&self.admin_address, network)?;
        Ok(())
    }

    pub(crate) fn params(&self) -> BuildParams {
        BuildParams::Deploy {
            token_address: self.token_address.clone(),
            admin_contract_address: self.admin_contract_address.clone(),
            admin_address: self.admin_address.clone(),
            symbol: self.symbol.clone(),
            uri: self.uri.clone(),
            decimals: self.decimals,
            whitelist: self.whitelist.clone(),
        }
    }

    pub(crate) fn metadata(&self) -> TransactionMetadata {
        TransactionMetadata {
            contract_address: self.token_address.to_string(),
            admin_contract_address: Some(self.admin_contract_address.to_string()),
            symbol: Some(self.symbol.clone()),
            ..Default::default()
        }
    }
}
