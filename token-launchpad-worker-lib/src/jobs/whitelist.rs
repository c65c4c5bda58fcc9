use super::{Authorization, RequiredAccount, TaskName};
use crate::backend::{BuildParams, TransactionEnvelope, WhitelistEntry};
use crate::error::{Error, Result};
use crate::types::{Address, Network, TransactionMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Replaces the whitelist of the admin, offer or bid contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistPayload {
    pub token_address: Address,
    pub sender: Address,
    /// Offer or bid contract. Not used for admin whitelist updates.
    #[serde(default)]
    pub contract_address: Option<Address>,
    pub whitelist: Vec<WhitelistEntry>,
    pub send_transaction: bool,
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(skip)]
    pub(crate) envelope: Option<TransactionEnvelope>,
}

impl WhitelistPayload {
    pub(crate) fn validate(&mut self, task: TaskName, network: Network) -> Result<()> {
        if matches!(task, TaskName::UpdateOfferWhitelist | TaskName::UpdateBidWhitelist)
            && self.contract_address.is_none()
        {
            return Err(Error::missing("contractAddress"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.whitelist.iter().find(|e| !seen.insert(&e.address)) {
            return Err(Error::InvalidInput(format!(
                "duplicate whitelist address {}",
                dup.address
            )));
        }
        self.envelope = self.auth.validate(&self.sender, network)?;
        Ok(())
    }

    pub(crate) fn required_accounts(&self, task: TaskName) -> Vec<RequiredAccount> {
        let mut accounts = vec![RequiredAccount::native("Contract", &self.token_address)];
        let role = match task {
            TaskName::UpdateOfferWhitelist => "Offer contract",
            TaskName::UpdateBidWhitelist => "Bid contract",
            _ => return accounts,
        };
        if let Some(contract) = &self.contract_address {
            accounts.push(RequiredAccount::for_token(role, contract, &self.token_address));
        }
        accounts
    }

    pub(crate) fn params(&self) -> BuildParams {
        BuildParams::Whitelist {
            token_address: self.token_address.clone(),
            contract_address: self.contract_address.clone(),
            whitelist: self.whitelist.clone(),
        }
    }

    pub(crate) fn metadata(&self, task: TaskName) -> TransactionMetadata {
        let contract = match (task, &self.contract_address) {
            (TaskName::UpdateAdminWhitelist, _) | (_, None) => &self.token_address,
            (_, Some(contract)) => contract,
        };
        TransactionMetadata {
            contract_address: contract.to_string(),
            ..Default::default()
        }
    }
}
