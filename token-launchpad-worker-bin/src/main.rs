use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinSet;
use token_launchpad_worker_lib::backend::{Backends, MetadataSink, NoopMetadataSink, Supervisor};
use token_launchpad_worker_lib::diagnostics::{analyze_circuits, verify_circuits};
use token_launchpad_worker_lib::sidecar::{HttpMetadataSink, SidecarClient};
use token_launchpad_worker_lib::{
    CircuitCache, CircuitName, Error, TransactionOrchestrator, VerificationKeyRegistry,
    WorkerConfig,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status asking the process supervisor for a fresh worker.
const EXIT_RESTART: i32 = 75;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker configuration file. Environment variables override its values.
    #[arg(short = 'c', long = "config", env = "TOKEN_WORKER_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute jobs given as JSON lines, one result line per job
    Run {
        /// Read jobs from this file instead of stdin
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,
    },
    /// Compile every circuit and compare its key with the pinned one
    VerifyKeys {
        /// Record the freshly compiled keys in the verification key file
        #[arg(long, default_value_t = false)]
        write: bool,
    },
    /// Report row counts of every circuit
    Analyze,
}

#[derive(Debug, Deserialize)]
struct JobLine {
    #[serde(default)]
    id: Option<serde_json::Value>,
    task: String,
    #[serde(default)]
    payloads: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum JobReply {
    Done {
        id: Option<serde_json::Value>,
        result: serde_json::Value,
    },
    Failed {
        id: Option<serde_json::Value>,
        error: String,
        fatal: bool,
    },
}

/// Turns a restart request from the circuit cache into a controlled exit.
#[derive(Default)]
struct ProcessSupervisor {
    requested: AtomicBool,
    notify: Notify,
}

impl ProcessSupervisor {
    fn restart_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl Supervisor for ProcessSupervisor {
    fn force_restart(&self, reason: &str) {
        error!(%reason, "Worker restart requested");
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

fn setup_logger() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_orchestrator(
    config: WorkerConfig,
    supervisor: Arc<ProcessSupervisor>,
) -> Result<TransactionOrchestrator> {
    let registry = VerificationKeyRegistry::load(&config.verification_keys_path)?;
    let sidecar = Arc::new(SidecarClient::new(config.sidecar_url.clone())?);
    let metadata: Arc<dyn MetadataSink> = match &config.metadata_url {
        Some(url) => Arc::new(HttpMetadataSink::new(url.clone())?),
        None => Arc::new(NoopMetadataSink),
    };
    let backends = Backends {
        compiler: sidecar.clone(),
        builder: sidecar.clone(),
        prover: sidecar.clone(),
        chain: sidecar,
        metadata,
        supervisor,
    };
    Ok(TransactionOrchestrator::new(
        config,
        registry,
        Arc::new(CircuitCache::new()),
        backends,
    ))
}

async fn handle_line(orchestrator: &TransactionOrchestrator, line: &str) -> JobReply {
    let job: JobLine = match serde_json::from_str(line) {
        Ok(job) => job,
        Err(e) => {
            return JobReply::Failed {
                id: None,
                error: Error::InvalidInput(format!("malformed job line: {}", e)).to_string(),
                fatal: false,
            };
        }
    };
    let payloads: Vec<String> = job
        .payloads
        .into_iter()
        .map(|p| match p {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    let outcome = orchestrator
        .execute(&job.task, &payloads)
        .await
        .and_then(|result| Ok(serde_json::from_str::<serde_json::Value>(&result)?));
    match outcome {
        Ok(result) => JobReply::Done { id: job.id, result },
        Err(e) => {
            warn!(task = %job.task, error = %e, "Job failed");
            JobReply::Failed {
                id: job.id,
                fatal: e.is_fatal(),
                error: e.to_string(),
            }
        }
    }
}

async fn write_replies<W>(mut out: W, mut replies: mpsc::UnboundedReceiver<JobReply>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        let mut line = serde_json::to_string(&reply)?;
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}

/// Executes job lines from `reader` until it ends, `interrupt` resolves or a
/// restart is requested, writing one reply line per started job to `out`.
async fn run_lines<R, W, I>(
    orchestrator: TransactionOrchestrator,
    supervisor: Arc<ProcessSupervisor>,
    reader: R,
    out: W,
    interrupt: I,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    I: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<JobReply>();
    let writer = tokio::spawn(write_replies(out, reply_rx));

    let semaphore = Arc::new(Semaphore::new(orchestrator.config().max_concurrent_jobs));
    let mut jobs = JoinSet::new();
    tokio::pin!(interrupt);
    info!(
        network = %orchestrator.config().network,
        max_concurrent_jobs = orchestrator.config().max_concurrent_jobs,
        "Waiting for jobs"
    );

    while !supervisor.restart_requested() {
        let line = tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!("Interrupted, no longer accepting jobs");
                break;
            }
            _ = supervisor.notify.notified() => break,
            line = lines.next_line() => line.context("Reading job line")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!("Interrupted, no longer accepting jobs");
                break;
            }
            _ = supervisor.notify.notified() => break,
            permit = semaphore.clone().acquire_owned() => permit?,
        };
        let orchestrator = orchestrator.clone();
        let reply_tx = reply_tx.clone();
        jobs.spawn(async move {
            let reply = handle_line(&orchestrator, &line).await;
            // The writer only stops once every sender is dropped.
            let _ = reply_tx.send(reply);
            drop(permit);
        });
    }

    while let Some(joined) = jobs.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Job task panicked");
        }
    }
    drop(reply_tx);
    writer.await??;
    Ok(())
}

async fn run_jobs(
    orchestrator: TransactionOrchestrator,
    supervisor: Arc<ProcessSupervisor>,
    input: Option<PathBuf>,
) -> Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Opening job file {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    run_lines(orchestrator, supervisor, reader, tokio::io::stdout(), interrupt).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and error handling
    setup_logger();
    color_eyre::install()?;

    let args = Args::parse();
    let config = WorkerConfig::load(args.config.as_deref()).context("Loading worker configuration")?;
    info!(network = %config.network, sidecar = %config.sidecar_url, "Starting token launchpad worker");

    match args.command {
        Command::Run { input } => {
            let supervisor = Arc::new(ProcessSupervisor::default());
            let orchestrator = build_orchestrator(config, supervisor.clone())?;
            run_jobs(orchestrator, supervisor.clone(), input).await?;
            if supervisor.restart_requested() {
                warn!("Exiting for restart");
                std::process::exit(EXIT_RESTART);
            }
        }
        Command::VerifyKeys { write } => {
            let registry = VerificationKeyRegistry::load(&config.verification_keys_path)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Starting from an empty verification key registry");
                    VerificationKeyRegistry::new()
                });
            let sidecar = SidecarClient::new(config.sidecar_url.clone())?;
            let report = verify_circuits(
                &sidecar,
                &registry,
                config.network,
                &config.cache_dir,
                &CircuitName::ALL,
            )
            .await?;
            if report.is_clean() {
                info!("All verification keys match");
            } else if write {
                report.updated.save(&config.verification_keys_path)?;
                info!(
                    path = %config.verification_keys_path.display(),
                    updated = report.mismatched.len(),
                    "Verification keys written"
                );
            } else {
                return Err(eyre!(
                    "{} verification keys differ from {}: {:?}",
                    report.mismatched.len(),
                    config.verification_keys_path.display(),
                    report.mismatched
                ));
            }
        }
        Command::Analyze => {
            let sidecar = SidecarClient::new(config.sidecar_url.clone())?;
            let sizes = analyze_circuits(&sidecar, &CircuitName::ALL).await?;
            for size in sizes {
                println!("{}: {} rows ({:.1}%)", size.circuit, size.rows, size.percent_of_max);
            }
        }
    }

    Ok(())
}
