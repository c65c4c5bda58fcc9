//! Job payloads accepted by the worker, one module per task family.

use crate::backend::{BuildParams, BuildRequest, BuiltTransaction, FeeTransfer, TransactionEnvelope};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::types::{Address, Amount, CircuitRole, Network, TransactionMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod deploy;
pub mod submit;
pub mod tiny;
pub mod token;
pub mod whitelist;

pub use deploy::DeployPayload;
pub use submit::{SubmitOutcome, SubmitState};
pub use tiny::TinyPayload;
pub use token::TokenPayload;
pub use whitelist::WhitelistPayload;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskName {
    Deploy,
    Mint,
    Transfer,
    Offer,
    Bid,
    Buy,
    Sell,
    WithdrawOffer,
    WithdrawBid,
    UpdateAdminWhitelist,
    UpdateOfferWhitelist,
    UpdateBidWhitelist,
    Tiny,
}

const TOKEN_AND_ADMIN: &[CircuitRole] = &[CircuitRole::Token, CircuitRole::Admin];
const TOKEN_ONLY: &[CircuitRole] = &[CircuitRole::Token];
const TOKEN_AND_OFFER: &[CircuitRole] = &[CircuitRole::Token, CircuitRole::Offer];
const TOKEN_AND_BID: &[CircuitRole] = &[CircuitRole::Token, CircuitRole::Bid];
const TINY_ONLY: &[CircuitRole] = &[CircuitRole::Tiny];

impl TaskName {
    pub const ALL: [TaskName; 13] = [
        TaskName::Deploy,
        TaskName::Mint,
        TaskName::Transfer,
        TaskName::Offer,
        TaskName::Bid,
        TaskName::Buy,
        TaskName::Sell,
        TaskName::WithdrawOffer,
        TaskName::WithdrawBid,
        TaskName::UpdateAdminWhitelist,
        TaskName::UpdateOfferWhitelist,
        TaskName::UpdateBidWhitelist,
        TaskName::Tiny,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::Deploy => "deploy",
            TaskName::Mint => "mint",
            TaskName::Transfer => "transfer",
            TaskName::Offer => "offer",
            TaskName::Bid => "bid",
            TaskName::Buy => "buy",
            TaskName::Sell => "sell",
            TaskName::WithdrawOffer => "withdrawOffer",
            TaskName::WithdrawBid => "withdrawBid",
            TaskName::UpdateAdminWhitelist => "updateAdminWhitelist",
            TaskName::UpdateOfferWhitelist => "updateOfferWhitelist",
            TaskName::UpdateBidWhitelist => "updateBidWhitelist",
            TaskName::Tiny => "tiny",
        }
    }

    /// Contracts whose circuits must be compiled and verified before a
    /// transaction of this kind is proved.
    pub fn circuit_roles(self) -> &'static [CircuitRole] {
        match self {
            TaskName::Deploy | TaskName::Mint | TaskName::UpdateAdminWhitelist => TOKEN_AND_ADMIN,
            TaskName::Transfer => TOKEN_ONLY,
            TaskName::Offer
            | TaskName::Buy
            | TaskName::WithdrawOffer
            | TaskName::UpdateOfferWhitelist => TOKEN_AND_OFFER,
            TaskName::Bid | TaskName::Sell | TaskName::WithdrawBid | TaskName::UpdateBidWhitelist => {
                TOKEN_AND_BID
            }
            TaskName::Tiny => TINY_ONLY,
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownTask(s.to_string()))
    }
}

/// Authorization and fee fields shared by every payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    #[serde(default)]
    pub serialized_transaction: Option<String>,
    #[serde(default)]
    pub signed_data: Option<String>,
    #[serde(default)]
    pub developer_address: Option<Address>,
    #[serde(default)]
    pub developer_fee: Option<Amount>,
    /// Network the client built the request for.
    #[serde(default)]
    pub chain: Option<Network>,
}

impl Authorization {
    /// Checks the shared fields and extracts the transaction envelope when a
    /// serialized transaction is supplied.
    pub fn validate(&self, signer: &Address, network: Network) -> Result<Option<TransactionEnvelope>> {
        if let Some(chain) = self.chain {
            if chain != network {
                return Err(Error::InvalidInput(format!(
                    "chain {} does not match worker network {}",
                    chain, network
                )));
            }
        }

        match (&self.developer_address, &self.developer_fee) {
            (Some(_), None) => return Err(Error::missing("developerFee")),
            (None, Some(_)) => return Err(Error::missing("developerAddress")),
            _ => {}
        }

        match (&self.serialized_transaction, &self.signed_data) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::missing("signedData")),
            (None, Some(_)) => Err(Error::missing("serializedTransaction")),
            (Some(serialized), Some(_)) => {
                let envelope: TransactionEnvelope = serde_json::from_str(serialized).map_err(|e| {
                    Error::InvalidInput(format!("Invalid serialized transaction: {}", e))
                })?;
                if &envelope.sender != signer {
                    return Err(Error::InvalidInput("Invalid sender".to_string()));
                }
                Ok(Some(envelope))
            }
        }
    }

    pub fn developer_transfer(&self) -> Option<FeeTransfer> {
        match (&self.developer_address, self.developer_fee) {
            (Some(recipient), Some(amount)) => Some(FeeTransfer {
                recipient: recipient.clone(),
                amount,
            }),
            _ => None,
        }
    }
}

/// An on-chain account that must exist before a transaction is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredAccount {
    /// Who the account belongs to, as named in the error.
    pub role: &'static str,
    pub address: Address,
    /// Token contract whose token account is required instead of the native one.
    pub token: Option<Address>,
}

impl RequiredAccount {
    pub fn native(role: &'static str, address: &Address) -> Self {
        Self {
            role,
            address: address.clone(),
            token: None,
        }
    }

    pub fn for_token(role: &'static str, address: &Address, token: &Address) -> Self {
        Self {
            role,
            address: address.clone(),
            token: Some(token.clone()),
        }
    }

    pub fn missing_message(&self) -> String {
        match self.token {
            None => format!("{} does not have account", self.role),
            Some(_) => format!("{} does not have account for this token", self.role),
        }
    }
}

/// A validated job, ready for the transaction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRequest {
    Deploy(DeployPayload),
    /// mint, transfer and the marketplace kinds.
    Token(TaskName, TokenPayload),
    Whitelist(TaskName, WhitelistPayload),
    Tiny(TinyPayload),
}

fn parse_payload<'a, T: Deserialize<'a>>(task: TaskName, payload: &'a str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| Error::InvalidInput(format!("{} payload: {}", task, e)))
}

impl TaskRequest {
    /// Parses and validates one payload. Makes no external calls.
    pub fn parse(task: TaskName, payload: &str, network: Network) -> Result<Self> {
        let mut request = match task {
            TaskName::Deploy => TaskRequest::Deploy(parse_payload(task, payload)?),
            TaskName::Mint
            | TaskName::Transfer
            | TaskName::Offer
            | TaskName::Bid
            | TaskName::Buy
            | TaskName::Sell
            | TaskName::WithdrawOffer
            | TaskName::WithdrawBid => TaskRequest::Token(task, parse_payload(task, payload)?),
            TaskName::UpdateAdminWhitelist
            | TaskName::UpdateOfferWhitelist
            | TaskName::UpdateBidWhitelist => {
                TaskRequest::Whitelist(task, parse_payload(task, payload)?)
            }
            TaskName::Tiny => TaskRequest::Tiny(parse_payload(task, payload)?),
        };
        request.validate(network)?;
        Ok(request)
    }

    fn validate(&mut self, network: Network) -> Result<()> {
        match self {
            TaskRequest::Deploy(p) => p.validate(network),
            TaskRequest::Token(task, p) => p.validate(*task, network),
            TaskRequest::Whitelist(task, p) => p.validate(*task, network),
            TaskRequest::Tiny(p) => p.validate(network),
        }
    }

    pub fn task(&self) -> TaskName {
        match self {
            TaskRequest::Deploy(_) => TaskName::Deploy,
            TaskRequest::Token(task, _) | TaskRequest::Whitelist(task, _) => *task,
            TaskRequest::Tiny(_) => TaskName::Tiny,
        }
    }

    /// The account that must sign and pay for the transaction.
    pub fn signer(&self) -> &Address {
        match self {
            TaskRequest::Deploy(p) => &p.admin_address,
            TaskRequest::Token(task, p) => p.signer(*task),
            TaskRequest::Whitelist(_, p) => &p.sender,
            TaskRequest::Tiny(p) => &p.sender,
        }
    }

    pub fn send_transaction(&self) -> bool {
        match self {
            TaskRequest::Deploy(p) => p.send_transaction,
            TaskRequest::Token(_, p) => p.send_transaction,
            TaskRequest::Whitelist(_, p) => p.send_transaction,
            TaskRequest::Tiny(p) => p.send_transaction,
        }
    }

    /// Accounts checked with a forced fetch before building, in order. The
    /// signer always comes first.
    pub fn required_accounts(&self) -> Vec<RequiredAccount> {
        let mut accounts = vec![RequiredAccount::native("Sender", self.signer())];
        match self {
            TaskRequest::Deploy(_) => {}
            TaskRequest::Token(task, p) => accounts.extend(p.required_accounts(*task)),
            TaskRequest::Whitelist(task, p) => accounts.extend(p.required_accounts(*task)),
            TaskRequest::Tiny(p) => {
                accounts.push(RequiredAccount::native("Contract", &p.contract_address))
            }
        }
        accounts
    }

    pub fn circuit_roles(&self) -> &'static [CircuitRole] {
        self.task().circuit_roles()
    }

    fn authorization(&self) -> &Authorization {
        match self {
            TaskRequest::Deploy(p) => &p.auth,
            TaskRequest::Token(_, p) => &p.auth,
            TaskRequest::Whitelist(_, p) => &p.auth,
            TaskRequest::Tiny(p) => &p.auth,
        }
    }

    fn envelope(&self) -> Option<&TransactionEnvelope> {
        match self {
            TaskRequest::Deploy(p) => p.envelope.as_ref(),
            TaskRequest::Token(_, p) => p.envelope.as_ref(),
            TaskRequest::Whitelist(_, p) => p.envelope.as_ref(),
            TaskRequest::Tiny(p) => p.envelope.as_ref(),
        }
    }

    fn params(&self) -> BuildParams {
        match self {
            TaskRequest::Deploy(p) => p.params(),
            TaskRequest::Token(_, p) => p.params(),
            TaskRequest::Whitelist(_, p) => p.params(),
            TaskRequest::Tiny(p) => p.params(),
        }
    }

    fn proving_fee(&self, config: &WorkerConfig) -> Option<FeeTransfer> {
        let amount = match self {
            TaskRequest::Deploy(_) => config.fees.launch_fee,
            TaskRequest::Token(..) | TaskRequest::Whitelist(..) => config.fees.transaction_fee,
            TaskRequest::Tiny(_) => return None,
        };
        Some(FeeTransfer {
            recipient: config.wallet.clone(),
            amount,
        })
    }

    pub fn build_request(&self, config: &WorkerConfig) -> BuildRequest {
        let auth = self.authorization();
        BuildRequest {
            tx_type: self.task(),
            network: config.network,
            sender: self.signer().clone(),
            envelope: self.envelope().cloned(),
            serialized_transaction: auth.serialized_transaction.clone(),
            signed_data: auth.signed_data.clone(),
            proving_fee: self.proving_fee(config),
            developer_fee: auth.developer_transfer(),
            params: self.params(),
        }
    }

    pub fn metadata(&self, built: &BuiltTransaction) -> TransactionMetadata {
        let mut metadata = match self {
            TaskRequest::Deploy(p) => p.metadata(),
            TaskRequest::Token(task, p) => p.metadata(*task),
            TaskRequest::Whitelist(task, p) => p.metadata(*task),
            TaskRequest::Tiny(p) => p.metadata(),
        };
        metadata.tx_type = self.task().to_string();
        metadata.sender = self.signer().to_string();
        if metadata.symbol.is_none() {
            metadata.symbol = built.symbol.clone();
        }
        metadata
    }
}
