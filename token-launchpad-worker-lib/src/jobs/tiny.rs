use super::Authorization;
use crate::backend::{BuildParams, TransactionEnvelope};
use crate::error::Result;
use crate::types::{Address, Amount, Network, TransactionMetadata};
use serde::{Deserialize, Serialize};

/// Sets a value on the minimal test contract. Used to check that the proving
/// pipeline works end to end without touching any token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TinyPayload {
    pub sender: Address,
    pub contract_address: Address,
    pub value: Amount,
    pub send_transaction: bool,
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(skip)]
    pub(crate) envelope: Option<TransactionEnvelope>,
}

impl TinyPayload {
    pub(crate) fn validate(&mut self, network: Network) -> Result<()> {
        self.envelope = self.auth.validate(&self.sender, network)?;
        Ok(())
    }

    pub(crate) fn params(&self) -> BuildParams {
        BuildParams::Tiny {
            contract_address: self.contract_address.clone(),
            value: self.value,
        }
    }

    pub(crate) fn metadata(&self) -> TransactionMetadata {
        TransactionMetadata {
            contract_address: self.contract_address.to_string(),
            value: Some(self.value),
            ..Default::default()
        }
    }
}
