use thiserror::Error;

use crate::types::{CircuitName, NetworkId};

/// Comprehensive error type for the token launchpad worker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration parsing error (TOML): {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error (JSON): {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sidecar returned {status}: {message}")]
    Sidecar { status: u16, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required configuration: {0}")]
    MissingConfiguration(String),

    // --- Job input ---
    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    // --- Circuit integrity ---
    #[error("Circuit compilation failed for {circuit}: {message}")]
    Compilation {
        circuit: CircuitName,
        message: String,
    },

    #[error("Verification key mismatch for {circuit}: {message}")]
    VerificationKeyMismatch {
        circuit: CircuitName,
        message: String,
    },

    #[error("Transaction references verification key {hash} which is not pinned on {network}")]
    UnpinnedVerificationKey { hash: String, network: NetworkId },

    #[error("Worker refuses new jobs after a circuit integrity failure; restart required")]
    WorkerPoisoned,

    // --- Transaction pipeline ---
    #[error("Transaction build failed: {0}")]
    Build(String),

    #[error("Transaction proving failed: {0}")]
    Prove(String),

    #[error("Chain request failed: {0}")]
    Chain(String),

    #[error("Could not acquire lock: {0}")]
    LockError(String),
}

impl Error {
    /// Integrity failures invalidate the process-wide circuit cache. Callers
    /// must not retry these in the same process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Compilation { .. }
                | Error::VerificationKeyMismatch { .. }
                | Error::UnpinnedVerificationKey { .. }
                | Error::WorkerPoisoned
        )
    }

    pub(crate) fn missing(field: &str) -> Self {
        Error::InvalidInput(format!("missing required field `{}`", field))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::LockError(format!("Mutex/RwLock poisoned: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
