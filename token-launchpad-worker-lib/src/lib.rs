//! token-launchpad-worker-lib
//! Orchestration library for a worker that builds, proves and submits
//! fungible-token transactions.

// Modules
pub mod backend;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod jobs;
pub mod registry;
pub mod sidecar;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use backend::{Backends, Supervisor};
pub use config::WorkerConfig;
pub use context::TransactionOrchestrator;
pub use error::{Error, Result};
pub use jobs::{TaskName, TaskRequest};
pub use registry::VerificationKeyRegistry;
pub use state::CircuitCache;
pub use types::{Address, Amount, CircuitName, JobResult, Network, NetworkId, VerificationKey};
