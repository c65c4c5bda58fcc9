use super::{Authorization, RequiredAccount, TaskName};
use crate::backend::{BuildParams, TransactionEnvelope};
use crate::error::{Error, Result};
use crate::types::{Address, Amount, Network, TransactionMetadata};
use serde::{Deserialize, Serialize};

/// Moves tokens: mint, transfer and the offer/bid marketplace flows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub token_address: Address,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    /// Per-token price in the native currency. Required for offer and bid.
    #[serde(default)]
    pub price: Option<Amount>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub admin_contract_address: Option<Address>,
    pub send_transaction: bool,
    #[serde(flatten)]
    pub auth: Authorization,
    #[serde(skip)]
    pub(crate) envelope: Option<TransactionEnvelope>,
}

impl TokenPayload {
    /// Offers, mints, transfers and sales are signed by the party the tokens
    /// leave. Bids, purchases and withdrawals are signed by the receiving side.
    pub fn signer(&self, task: TaskName) -> &Address {
        match task {
            TaskName::Bid | TaskName::Buy | TaskName::WithdrawOffer | TaskName::WithdrawBid => {
                &self.to
            }
            _ => &self.from,
        }
    }

    pub(crate) fn validate(&mut self, task: TaskName, network: Network) -> Result<()> {
        if matches!(task, TaskName::Offer | TaskName::Bid) && self.price.is_none() {
            return Err(Error::missing("price"));
        }
        if self.amount.get() == 0 {
            return Err(Error::InvalidInput("amount must be greater than zero".to_string()));
        }
        let signer = self.signer(task).clone();
        self.envelope = self.auth.validate(&signer, network)?;
        Ok(())
    }

    /// Token-side accounts. The signer's native account is checked by the caller.
    pub(crate) fn required_accounts(&self, task: TaskName) -> Vec<RequiredAccount> {
        let token = &self.token_address;
        let mut accounts = vec![
            RequiredAccount::native("Contract", token),
            RequiredAccount::for_token("Contract", token, token),
        ];
        if task == TaskName::Mint {
            if let Some(admin) = &self.admin_contract_address {
                accounts.push(RequiredAccount::native("Admin contract", admin));
            }
        }
        // The side the tokens leave must already hold them.
        if matches!(
            task,
            TaskName::Transfer | TaskName::Offer | TaskName::Sell | TaskName::WithdrawOffer
        ) {
            let role = if &self.from == self.signer(task) { "Sender" } else { "Source" };
            accounts.push(RequiredAccount::for_token(role, &self.from, token));
        }
        if task == TaskName::Sell {
            accounts.push(RequiredAccount::for_token("Receiver", &self.to, token));
        }
        accounts
    }

    pub(crate) fn params(&self) -> BuildParams {
        BuildParams::Token {
            token_address: self.token_address.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            amount: self.amount,
            price: self.price,
        }
    }

    pub(crate) fn metadata(&self, task: TaskName) -> TransactionMetadata {
        TransactionMetadata {
            contract_address: self.token_address.to_string(),
            admin_contract_address: match task {
                TaskName::Mint => self.admin_contract_address.as_ref().map(Address::to_string),
                _ => None,
            },
            from: Some(self.from.to_string()),
            to: Some(self.to.to_string()),
            amount: Some(self.amount),
            price: self.price,
            symbol: self.symbol.clone(),
            ..Default::default()
        }
    }
}
