//! Offline checks run from the command line rather than per job.

use crate::backend::CircuitCompiler;
use crate::error::Result;
use crate::registry::{PinnedKey, VerificationKeyRegistry};
use crate::types::{CircuitName, Network};
use std::path::Path;
use tracing::{info, warn};

/// Row limit of a single circuit.
pub const MAX_ROWS: u64 = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitSize {
    pub circuit: CircuitName,
    pub rows: u64,
    /// Share of [`MAX_ROWS`] used by all methods together.
    pub percent_of_max: f64,
}

pub async fn analyze_circuits(
    compiler: &dyn CircuitCompiler,
    circuits: &[CircuitName],
) -> Result<Vec<CircuitSize>> {
    let mut sizes = Vec::with_capacity(circuits.len());
    for &circuit in circuits {
        let methods = compiler.analyze_methods(circuit).await?;
        let rows: u64 = methods.values().map(|m| m.rows).sum();
        let percent_of_max = rows as f64 * 100.0 / MAX_ROWS as f64;
        info!(%circuit, rows, methods = methods.len(), "{} rows ({:.1}% of max)", rows, percent_of_max);
        sizes.push(CircuitSize {
            circuit,
            rows,
            percent_of_max,
        });
    }
    Ok(sizes)
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// Circuits whose compiled key differs from the pinned one, or has no pin.
    pub mismatched: Vec<CircuitName>,
    /// The pinned registry updated with every freshly compiled key, stamped
    /// with the worker version when anything changed.
    pub updated: VerificationKeyRegistry,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Compiles each circuit and compares it with the key pinned for `network`.
pub async fn verify_circuits(
    compiler: &dyn CircuitCompiler,
    registry: &VerificationKeyRegistry,
    network: Network,
    cache_dir: &Path,
    circuits: &[CircuitName],
) -> Result<VerificationReport> {
    let network_id = network.network_id();
    let mut updated = registry.clone();
    let mut mismatched = Vec::new();

    for &circuit in circuits {
        let key = compiler.compile(circuit, cache_dir).await?;
        match registry.verify(network_id, circuit, &key) {
            Ok(()) => info!(%circuit, hash = %key.hash, "Verification key matches"),
            Err(e) => {
                warn!(%circuit, hash = %key.hash, fingerprint = %key.fingerprint(), error = %e, "Verification key differs");
                mismatched.push(circuit);
                let mut pinned = PinnedKey::from(&key);
                pinned.kind = Some(circuit.kind().to_string());
                updated.insert(network_id, circuit, pinned);
            }
        }
    }

    if !mismatched.is_empty() {
        updated.set_version(network_id, env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }

    Ok(VerificationReport {
        mismatched,
        updated,
    })
}
