use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// Networks the worker can be pointed at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Devnet,
    Lightnet,
    Local,
    /// Low-finality sidechain used for fast iteration. Submissions that are
    /// not accepted into the pool are retried here.
    Zeko,
}

impl Network {
    /// Pinned verification keys are recorded for `mainnet` and for a single
    /// shared `testnet` set used by every other network.
    pub fn network_id(self) -> NetworkId {
        match self {
            Network::Mainnet => NetworkId::Mainnet,
            _ => NetworkId::Testnet,
        }
    }

    pub fn is_sidechain(self) -> bool {
        matches!(self, Network::Zeko)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
            Network::Lightnet => "lightnet",
            Network::Local => "local",
            Network::Zeko => "zeko",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "devnet" => Ok(Network::Devnet),
            "lightnet" => Ok(Network::Lightnet),
            "local" => Ok(Network::Local),
            "zeko" => Ok(Network::Zeko),
            _ => Err(Error::ConfigError(format!("Invalid network: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Mainnet,
    Testnet,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Mainnet => f.write_str("mainnet"),
            NetworkId::Testnet => f.write_str("testnet"),
        }
    }
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const ADDRESS_LEN: usize = 55;

/// A base58 public key (`B62…`). Only the textual shape is checked here;
/// checksum validation belongs to the transaction builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != ADDRESS_LEN || !value.starts_with("B62") {
            return Err(Error::InvalidInput(format!("Invalid address: {}", value)));
        }
        if let Some(c) = value.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(Error::InvalidInput(format!(
                "Invalid character {:?} in address {}",
                c, value
            )));
        }
        Ok(Address(value))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::try_from(s.to_string())
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount in the smallest integer unit of a token (or of the native
/// currency for fees). Accepts JSON integers or decimal strings and is always
/// written back as a decimal string so it survives 53-bit JSON consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub u64);

impl Amount {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal integer string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u64::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom(format!("amount must not be negative: {}", v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                Err(E::custom(format!("amount must be an integer: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.trim()
                    .parse::<u64>()
                    .map(Amount)
                    .map_err(|_| E::custom(format!("invalid amount: {:?}", v)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Compiled circuits known to the worker. Variant names match the keys used in
/// recorded verification-key files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CircuitName {
    FungibleToken,
    FungibleTokenAdmin,
    AdvancedFungibleToken,
    FungibleTokenAdvancedAdmin,
    FungibleTokenOfferContract,
    FungibleTokenBidContract,
    TinyContract,
}

impl CircuitName {
    pub const ALL: [CircuitName; 7] = [
        CircuitName::FungibleToken,
        CircuitName::FungibleTokenAdmin,
        CircuitName::AdvancedFungibleToken,
        CircuitName::FungibleTokenAdvancedAdmin,
        CircuitName::FungibleTokenOfferContract,
        CircuitName::FungibleTokenBidContract,
        CircuitName::TinyContract,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitName::FungibleToken => "FungibleToken",
            CircuitName::FungibleTokenAdmin => "FungibleTokenAdmin",
            CircuitName::AdvancedFungibleToken => "AdvancedFungibleToken",
            CircuitName::FungibleTokenAdvancedAdmin => "FungibleTokenAdvancedAdmin",
            CircuitName::FungibleTokenOfferContract => "FungibleTokenOfferContract",
            CircuitName::FungibleTokenBidContract => "FungibleTokenBidContract",
            CircuitName::TinyContract => "TinyContract",
        }
    }

    /// Category recorded next to each key in verification-key files.
    pub fn kind(self) -> &'static str {
        match self {
            CircuitName::FungibleToken | CircuitName::AdvancedFungibleToken => "token",
            CircuitName::FungibleTokenAdmin | CircuitName::FungibleTokenAdvancedAdmin => "admin",
            _ => "user",
        }
    }
}

impl fmt::Display for CircuitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown circuit: {}", s)))
    }
}

// The part a contract plays in a transaction, resolved to a concrete circuit
// once the builder reports whether the token is the advanced variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CircuitRole {
    Token,
    Admin,
    Offer,
    Bid,
    Tiny,
}

impl CircuitRole {
    pub fn circuit(self, is_advanced: bool) -> CircuitName {
        match (self, is_advanced) {
            (CircuitRole::Token, false) => CircuitName::FungibleToken,
            (CircuitRole::Token, true) => CircuitName::AdvancedFungibleToken,
            (CircuitRole::Admin, false) => CircuitName::FungibleTokenAdmin,
            (CircuitRole::Admin, true) => CircuitName::FungibleTokenAdvancedAdmin,
            (CircuitRole::Offer, _) => CircuitName::FungibleTokenOfferContract,
            (CircuitRole::Bid, _) => CircuitName::FungibleTokenBidContract,
            (CircuitRole::Tiny, _) => CircuitName::TinyContract,
        }
    }
}

/// A compiled verification key: the field hash as a decimal string and the
/// base64 key data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationKey {
    pub hash: String,
    pub data: String,
}

impl VerificationKey {
    /// Short digest of the key data for log lines.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.data.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// Terminal output of one job.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JobResult {
    pub success: bool,
    pub tx: Option<String>,
    pub hash: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Transaction metadata published after a submission.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub sender: String,
    pub contract_address: String,
    pub admin_contract_address: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<Amount>,
    pub price: Option<Amount>,
    pub symbol: Option<String>,
    pub value: Option<Amount>,
}
