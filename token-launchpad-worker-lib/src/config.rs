use crate::error::{Error, Result};
use crate::types::{Address, Amount, Network};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const ENV_NETWORK: &str = "TOKEN_WORKER_NETWORK";
pub const ENV_WALLET: &str = "TOKEN_WORKER_WALLET";
pub const ENV_SIDECAR_URL: &str = "TOKEN_WORKER_SIDECAR_URL";
pub const ENV_METADATA_URL: &str = "TOKEN_WORKER_METADATA_URL";
pub const ENV_CACHE_DIR: &str = "TOKEN_WORKER_CACHE_DIR";
pub const ENV_VK_PATH: &str = "TOKEN_WORKER_VK_PATH";
pub const ENV_WAIT_FOR_INCLUSION: &str = "TOKEN_WORKER_WAIT_FOR_INCLUSION";

/// Retry policy for submissions that are not accepted into the pending pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubmitPolicy {
    /// Fixed sleep between resubmissions on the sidechain.
    pub backoff_secs: u64,
    /// Soft budget for sidechain resubmissions, measured from the first attempt.
    pub sidechain_budget_secs: u64,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            backoff_secs: 10,
            sidechain_budget_secs: 60,
        }
    }
}

impl SubmitPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn sidechain_budget(&self) -> Duration {
        Duration::from_secs(self.sidechain_budget_secs)
    }
}

/// Proving fees charged to the sender and paid to the configured wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeeSchedule {
    /// Charged on token deployment.
    pub launch_fee: Amount,
    /// Charged on every other token transaction.
    pub transaction_fee: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            launch_fee: Amount(1_000_000_000),
            transaction_fee: Amount(100_000_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub network: Network,
    /// Recipient of proving fees.
    pub wallet: Address,
    /// Base URL of the proving sidecar that hosts the circuits and chain client.
    pub sidecar_url: Url,
    /// Where transaction metadata is published. Publishing is skipped when unset.
    #[serde(default)]
    pub metadata_url: Option<Url>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_verification_keys_path")]
    pub verification_keys_path: PathBuf,
    /// Wait for block inclusion after a successful send (local and test setups).
    #[serde(default)]
    pub wait_for_inclusion: bool,
    #[serde(default)]
    pub submit: SubmitPolicy,
    #[serde(default)]
    pub fees: FeeSchedule,
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_verification_keys_path() -> PathBuf {
    PathBuf::from("./vk/verification-keys.json")
}

fn default_metadata_timeout_secs() -> u64 {
    5
}

fn default_max_concurrent_jobs() -> usize {
    1
}

impl WorkerConfig {
    pub fn new(network: Network, wallet: Address, sidecar_url: Url) -> Self {
        Self {
            network,
            wallet,
            sidecar_url,
            metadata_url: None,
            cache_dir: default_cache_dir(),
            verification_keys_path: default_verification_keys_path(),
            wait_for_inclusion: false,
            submit: SubmitPolicy::default(),
            fees: FeeSchedule::default(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }

    pub fn from_toml(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config file if one is given, then applies environment
    /// overrides. Without a file, network, wallet and sidecar URL must come
    /// from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Some(Self::from_toml(path)?),
            None => None,
        };
        let config = Self::apply_env(base, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_env(
        base: Option<Self>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match base {
            Some(config) => config,
            None => {
                let network = lookup(ENV_NETWORK)
                    .ok_or_else(|| Error::MissingConfiguration(ENV_NETWORK.to_string()))?
                    .parse()?;
                let wallet = lookup(ENV_WALLET)
                    .ok_or_else(|| Error::MissingConfiguration(ENV_WALLET.to_string()))?
                    .parse()?;
                let sidecar_url = Url::parse(
                    &lookup(ENV_SIDECAR_URL)
                        .ok_or_else(|| Error::MissingConfiguration(ENV_SIDECAR_URL.to_string()))?,
                )?;
                Self::new(network, wallet, sidecar_url)
            }
        };

        if let Some(network) = lookup(ENV_NETWORK) {
            config.network = network.parse()?;
        }
        if let Some(wallet) = lookup(ENV_WALLET) {
            config.wallet = wallet.parse()?;
        }
        if let Some(url) = lookup(ENV_SIDECAR_URL) {
            config.sidecar_url = Url::parse(&url)?;
        }
        if let Some(url) = lookup(ENV_METADATA_URL) {
            config.metadata_url = Some(Url::parse(&url)?);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_VK_PATH) {
            config.verification_keys_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup(ENV_WAIT_FOR_INCLUSION) {
            config.wait_for_inclusion = match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(Error::ConfigError(format!(
                        "{} must be a boolean, got {}",
                        ENV_WAIT_FOR_INCLUSION, flag
                    )));
                }
            };
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.submit.backoff_secs == 0 {
            return Err(Error::ConfigError(
                "submit.backoff_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::ConfigError(
                "max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}
