#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use token_launchpad_worker_lib::backend::{
    AccountInfo, Backends, BuildRequest, BuiltTransaction, ChainClient, CircuitCompiler,
    InclusionResponse, MetadataSink, MethodStats, ProvedTransaction, Prover, SendResponse,
    Supervisor, TransactionBuilder,
};
use token_launchpad_worker_lib::registry::PinnedKey;
use token_launchpad_worker_lib::types::TransactionMetadata;
use token_launchpad_worker_lib::{
    Address, CircuitCache, CircuitName, Error, Network, NetworkId, Result,
    TransactionOrchestrator, VerificationKey, VerificationKeyRegistry, WorkerConfig,
};
use url::Url;

pub const WALLET: &str = "B62qqhvKVk2KEia7awrhNM1nPLUEXDM8WiPut7xXKrNDYDae1JU5GzN";
pub const ADMIN: &str = "B62qmKggMTU6TyrEXdCGEakBbsc3EBeypXTWQmpqRA3y88xepXeQm3a";
pub const USER: &str = "B62qmWwo7jjmUp6yEWw1e1zYV5D2mGX6auumiqfn3ZkkoJbTgvwifKs";
pub const TOKEN: &str = "B62qrnnYQfFt9tPRp44fsWHds8LF7ojJKhknYZKNYU3X4xVCdSnnRJc";
pub const ADMIN_CONTRACT: &str = "B62qrHNkJRLkrwn4GqWLNkGR1JSBqXFhaDaYex7L5GRQDAS8KLr5YZw";
pub const OFFER_CONTRACT: &str = "B62qj2YbEjkPr4WhGdTKSMZ2WQik6kty5FZ8vqfKUKv32GQxBjRRSWh";
pub const TINY_CONTRACT: &str = "B62qjMFSmQTknm3dbkFSFK1CooiHowASg9nU6hHXHfBFQ64snRTRCTe";

/// The key the fake compiler produces for `circuit`.
pub fn compiled_key(circuit: CircuitName) -> VerificationKey {
    VerificationKey {
        hash: format!("{}-hash", circuit),
        data: format!("{}-data", circuit),
    }
}

/// A registry pinning every circuit to what the fake compiler produces.
pub fn pinned_registry() -> VerificationKeyRegistry {
    let mut registry = VerificationKeyRegistry::new();
    for network in [NetworkId::Mainnet, NetworkId::Testnet] {
        for circuit in CircuitName::ALL {
            registry.insert(network, circuit, PinnedKey::from(&compiled_key(circuit)));
        }
    }
    registry
}

pub fn config(network: Network) -> WorkerConfig {
    WorkerConfig::new(
        network,
        WALLET.parse().unwrap(),
        Url::parse("http://127.0.0.1:7070/").unwrap(),
    )
}

#[derive(Default)]
pub struct FakeCompiler {
    pub compiled: Mutex<Vec<CircuitName>>,
    pub fail: AtomicBool,
}

impl FakeCompiler {
    pub fn compiled(&self) -> Vec<CircuitName> {
        self.compiled.lock().unwrap().clone()
    }

    pub fn compiled_set(&self) -> HashSet<CircuitName> {
        self.compiled().into_iter().collect()
    }
}

#[async_trait]
impl CircuitCompiler for FakeCompiler {
    async fn compile(&self, circuit: CircuitName, _cache_dir: &Path) -> Result<VerificationKey> {
        self.compiled.lock().unwrap().push(circuit);
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Compilation {
                circuit,
                message: "out of memory".to_string(),
            });
        }
        Ok(compiled_key(circuit))
    }

    async fn analyze_methods(&self, circuit: CircuitName) -> Result<BTreeMap<String, MethodStats>> {
        let mut methods = BTreeMap::new();
        methods.insert("transfer".to_string(), MethodStats { rows: 16_384 });
        if circuit == CircuitName::FungibleToken {
            methods.insert("mint".to_string(), MethodStats { rows: 16_384 });
        }
        Ok(methods)
    }
}

#[derive(Default)]
pub struct FakeBuilder {
    pub requests: Mutex<Vec<BuildRequest>>,
    pub is_advanced: AtomicBool,
    pub referenced_hashes: Mutex<Vec<String>>,
    pub fail: Mutex<Option<String>>,
}

impl FakeBuilder {
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionBuilder for FakeBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<BuiltTransaction> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.fail.lock().unwrap().clone() {
            return Err(Error::Build(message));
        }
        Ok(BuiltTransaction {
            tx: serde_json::to_string(request)?,
            is_advanced: self.is_advanced.load(Ordering::SeqCst),
            verification_key_hashes: self.referenced_hashes.lock().unwrap().clone(),
            symbol: Some("TEST".to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeProver {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Prover for FakeProver {
    async fn prove(&self, tx: &BuiltTransaction) -> Result<ProvedTransaction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProvedTransaction {
            tx: json!({ "proved": true, "transaction": tx.tx }).to_string(),
        })
    }
}

pub fn pending(hash: &str) -> SendResponse {
    SendResponse {
        status: "pending".to_string(),
        hash: Some(hash.to_string()),
        errors: vec![],
    }
}

pub fn rejected(error: &str) -> SendResponse {
    SendResponse {
        status: "rejected".to_string(),
        hash: Some("5JuRejected".to_string()),
        errors: vec![error.to_string()],
    }
}

pub struct FakeChain {
    /// Responses returned in order before falling back to `fallback`.
    pub script: Mutex<VecDeque<SendResponse>>,
    pub fallback: Mutex<SendResponse>,
    pub send_error: AtomicBool,
    pub wait_error: AtomicBool,
    pub sends: AtomicUsize,
    pub waits: AtomicUsize,
    pub fetches: AtomicUsize,
    pub fetch_error: AtomicBool,
    /// Addresses without a native account.
    pub missing_accounts: Mutex<HashSet<Address>>,
    /// Addresses without a token account, whatever the token.
    pub missing_token_accounts: Mutex<HashSet<Address>>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(pending("5JuPending")),
            send_error: AtomicBool::new(false),
            wait_error: AtomicBool::new(false),
            sends: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fetch_error: AtomicBool::new(false),
            missing_accounts: Mutex::new(HashSet::new()),
            missing_token_accounts: Mutex::new(HashSet::new()),
        }
    }
}

impl FakeChain {
    pub fn respond_with(&self, response: SendResponse) {
        *self.fallback.lock().unwrap() = response;
    }

    pub fn then(&self, response: SendResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn remove_account(&self, address: &str) {
        self.missing_accounts
            .lock()
            .unwrap()
            .insert(address.parse().unwrap());
    }

    pub fn remove_token_account(&self, address: &str) {
        self.missing_token_accounts
            .lock()
            .unwrap()
            .insert(address.parse().unwrap());
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn send(&self, _tx: &ProvedTransaction) -> Result<SendResponse> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.send_error.load(Ordering::SeqCst) {
            return Err(Error::Chain("connection reset".to_string()));
        }
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone()))
    }

    async fn wait(&self, hash: &str) -> Result<InclusionResponse> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        if self.wait_error.load(Ordering::SeqCst) {
            return Err(Error::Chain("transaction dropped".to_string()));
        }
        Ok(InclusionResponse {
            status: "included".to_string(),
            hash: hash.to_string(),
        })
    }

    async fn fetch_account(
        &self,
        address: &Address,
        token: Option<&Address>,
    ) -> Result<Option<AccountInfo>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fetch_error.load(Ordering::SeqCst) {
            return Err(Error::Chain("graphql endpoint unreachable".to_string()));
        }
        let missing = match token {
            None => &self.missing_accounts,
            Some(_) => &self.missing_token_accounts,
        };
        if missing.lock().unwrap().contains(address) {
            return Ok(None);
        }
        Ok(Some(AccountInfo {
            public_key: address.clone(),
            token_id: token.map(|t| format!("token-of-{}", t)),
            balance: None,
            nonce: Some(0),
        }))
    }
}

#[derive(Default)]
pub struct FakeMetadata {
    pub published: Mutex<Vec<(String, TransactionMetadata)>>,
    pub fail: AtomicBool,
}

impl FakeMetadata {
    pub fn published(&self) -> Vec<(String, TransactionMetadata)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataSink for FakeMetadata {
    async fn publish(&self, tx_id: &str, metadata: &TransactionMetadata) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((tx_id.to_string(), metadata.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Sidecar {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSupervisor {
    pub restarts: AtomicUsize,
}

impl FakeSupervisor {
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Supervisor for FakeSupervisor {
    fn force_restart(&self, _reason: &str) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fake collaborators plus the orchestrator wired to them.
#[derive(Default)]
pub struct Harness {
    pub compiler: Arc<FakeCompiler>,
    pub builder: Arc<FakeBuilder>,
    pub prover: Arc<FakeProver>,
    pub chain: Arc<FakeChain>,
    pub metadata: Arc<FakeMetadata>,
    pub supervisor: Arc<FakeSupervisor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backends(&self) -> Backends {
        Backends {
            compiler: self.compiler.clone(),
            builder: self.builder.clone(),
            prover: self.prover.clone(),
            chain: self.chain.clone(),
            metadata: self.metadata.clone(),
            supervisor: self.supervisor.clone(),
        }
    }

    pub fn orchestrator(&self, network: Network) -> TransactionOrchestrator {
        self.orchestrator_with(config(network), pinned_registry())
    }

    pub fn orchestrator_with(
        &self,
        config: WorkerConfig,
        registry: VerificationKeyRegistry,
    ) -> TransactionOrchestrator {
        TransactionOrchestrator::new(
            config,
            registry,
            Arc::new(CircuitCache::new()),
            self.backends(),
        )
    }

    /// Total calls made to any collaborator.
    pub fn external_calls(&self) -> usize {
        self.compiler.compiled().len()
            + self.builder.calls()
            + self.prover.calls.load(Ordering::SeqCst)
            + self.chain.sends()
            + self.chain.waits.load(Ordering::SeqCst)
            + self.chain.fetches()
            + self.metadata.published().len()
            + self.supervisor.restarts()
    }
}

pub fn mint_payload(send: bool) -> String {
    json!({
        "tokenAddress": TOKEN,
        "from": ADMIN,
        "to": USER,
        "amount": 1_000_000_000_000u64,
        "sendTransaction": send
    })
    .to_string()
}

pub fn transfer_payload(send: bool) -> String {
    json!({
        "tokenAddress": TOKEN,
        "from": ADMIN,
        "to": USER,
        "amount": 5_000_000_000u64,
        "sendTransaction": send
    })
    .to_string()
}

/// A valid dry-run payload for every task kind.
pub fn dry_run_payload(task: &str) -> String {
    let value = match task {
        "deploy" => json!({
            "adminAddress": ADMIN,
            "tokenAddress": TOKEN,
            "adminContractAddress": ADMIN_CONTRACT,
            "symbol": "TEST",
            "uri": "https://example.com/token.json",
            "sendTransaction": false
        }),
        "updateAdminWhitelist" | "updateOfferWhitelist" | "updateBidWhitelist" => json!({
            "tokenAddress": TOKEN,
            "sender": ADMIN,
            "contractAddress": OFFER_CONTRACT,
            "whitelist": [{ "address": USER, "amount": 100 }],
            "sendTransaction": false
        }),
        "tiny" => json!({
            "sender": ADMIN,
            "contractAddress": TINY_CONTRACT,
            "value": 42,
            "sendTransaction": false
        }),
        _ => json!({
            "tokenAddress": TOKEN,
            "from": ADMIN,
            "to": USER,
            "amount": 10,
            "price": 2_000_000_000u64,
            "sendTransaction": false
        }),
    };
    value.to_string()
}
