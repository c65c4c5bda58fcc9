use crate::backend::{CircuitCompiler, Supervisor};
use crate::error::{Error, Result};
use crate::registry::VerificationKeyRegistry;
use crate::types::{CircuitName, NetworkId, VerificationKey};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Process-wide cache of compiled and verified circuits.
///
/// Each circuit is compiled at most once per cache. Concurrent callers for the
/// same circuit wait on a single compilation. A compile failure or a key that
/// differs from the pinned registry poisons the cache: every later lookup
/// fails with [`Error::WorkerPoisoned`] and the supervisor is asked to replace
/// the process exactly once.
#[derive(Debug, Default)]
pub struct CircuitCache {
    cells: Mutex<HashMap<CircuitName, Arc<OnceCell<VerificationKey>>>>,
    poisoned: AtomicBool,
    restart_requested: AtomicBool,
}

impl CircuitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Marks the cache unusable and notifies the supervisor on the first call.
    pub fn poison(&self, reason: &str, supervisor: &dyn Supervisor) {
        self.poisoned.store(true, Ordering::SeqCst);
        if !self.restart_requested.swap(true, Ordering::SeqCst) {
            error!(%reason, "Circuit cache poisoned, requesting worker restart");
            supervisor.force_restart(reason);
        }
    }

    /// Compiles `circuit` on first use and checks the result against the
    /// key pinned for `network_id`.
    pub async fn get_or_compile(
        &self,
        circuit: CircuitName,
        compiler: &dyn CircuitCompiler,
        registry: &VerificationKeyRegistry,
        network_id: NetworkId,
        cache_dir: &Path,
        supervisor: &dyn Supervisor,
    ) -> Result<VerificationKey> {
        if self.is_poisoned() {
            return Err(Error::WorkerPoisoned);
        }

        let cell = {
            let mut cells = self.cells.lock()?;
            cells.entry(circuit).or_default().clone()
        };

        cell.get_or_try_init(|| async {
            // A waiter that lost the race to a failed compilation must not
            // compile again in a poisoned process.
            if self.is_poisoned() {
                return Err(Error::WorkerPoisoned);
            }
            let verified = compile_and_verify(circuit, compiler, registry, network_id, cache_dir).await;
            // Poison before the cell lets the next waiter in.
            if let Err(e) = &verified {
                self.poison(&e.to_string(), supervisor);
            }
            verified
        })
        .await
        .cloned()
    }
}

async fn compile_and_verify(
    circuit: CircuitName,
    compiler: &dyn CircuitCompiler,
    registry: &VerificationKeyRegistry,
    network_id: NetworkId,
    cache_dir: &Path,
) -> Result<VerificationKey> {
    info!(%circuit, "Compiling circuit");
    let key = compiler.compile(circuit, cache_dir).await.map_err(|e| match e {
        e @ Error::Compilation { .. } => e,
        other => Error::Compilation {
            circuit,
            message: other.to_string(),
        },
    })?;
    registry.verify(network_id, circuit, &key)?;
    debug!(%circuit, hash = %key.hash, fingerprint = %key.fingerprint(), "Circuit verified");
    Ok(key)
}
