use crate::error::{Error, Result};
use crate::types::{CircuitName, NetworkId, VerificationKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A verification key recorded for a deployed contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinnedKey {
    pub hash: String,
    pub data: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PinnedKey {
    pub fn matches(&self, key: &VerificationKey) -> bool {
        self.hash == key.hash && self.data == key.data
    }
}

impl From<&VerificationKey> for PinnedKey {
    fn from(key: &VerificationKey) -> Self {
        Self {
            hash: key.hash.clone(),
            data: key.data.clone(),
            kind: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkKeys {
    /// Toolchain versions the keys were produced with.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,
    #[serde(default)]
    pub vk: BTreeMap<CircuitName, PinnedKey>,
}

/// The authoritative verification keys per network id.
///
/// Loaded from a JSON file of the form
/// `{ "testnet": { "vk": { "FungibleToken": { "hash": .., "data": .. } } } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct VerificationKeyRegistry {
    networks: BTreeMap<NetworkId, NetworkKeys>,
}

impl VerificationKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read verification keys from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn expected(&self, network: NetworkId, circuit: CircuitName) -> Option<&PinnedKey> {
        self.networks.get(&network)?.vk.get(&circuit)
    }

    pub fn insert(&mut self, network: NetworkId, circuit: CircuitName, key: PinnedKey) {
        self.networks
            .entry(network)
            .or_default()
            .vk
            .insert(circuit, key);
    }

    /// Records the version of `tool` the network's keys were produced with.
    pub fn set_version(&mut self, network: NetworkId, tool: &str, version: &str) {
        self.networks
            .entry(network)
            .or_default()
            .versions
            .insert(tool.to_string(), version.to_string());
    }

    /// Returns whether `hash` is the pinned hash of any of `circuits`.
    pub fn pins_hash(&self, network: NetworkId, circuits: &[CircuitName], hash: &str) -> bool {
        circuits
            .iter()
            .filter_map(|c| self.expected(network, *c))
            .any(|pinned| pinned.hash == hash)
    }

    /// Checks a freshly compiled key against the pinned one.
    pub fn verify(
        &self,
        network: NetworkId,
        circuit: CircuitName,
        compiled: &VerificationKey,
    ) -> Result<()> {
        let pinned = self.expected(network, circuit).ok_or_else(|| {
            Error::VerificationKeyMismatch {
                circuit,
                message: format!("no recorded verification key for {}", network),
            }
        })?;
        if pinned.hash != compiled.hash {
            return Err(Error::VerificationKeyMismatch {
                circuit,
                message: format!(
                    "compiled hash {} differs from recorded {} on {}",
                    compiled.hash, pinned.hash, network
                ),
            });
        }
        if pinned.data != compiled.data {
            return Err(Error::VerificationKeyMismatch {
                circuit,
                message: format!("compiled key data differs from recorded data on {}", network),
            });
        }
        Ok(())
    }
}
