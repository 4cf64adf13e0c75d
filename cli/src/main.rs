//! CLI entrypoint for ScoreHive
//!
//! This is the main binary that wires together all layers using
//! dependency injection. The same executable runs the coordinator, the
//! worker ranks it spawns, and the protocol client.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use scorehive_application::{
    ClusterTransport, DistributionError, NoReviewLogger, ReviewLogger, RunWorkerUseCase,
    WorkCoordinator, WorkerLink, WorkerSummary,
};
use scorehive_domain::{EvaluationEngine, PoolSize, Rank};
use scorehive_infrastructure::{
    ConfigLoader, FileConfig, JsonlReviewLogger, LaunchMode, LocalCluster, TcpClusterTransport,
    WorkerLaunch,
};
use scorehive_presentation::{
    Cli, Command, ProtocolClient, ProtocolServer, RequestHandler, RequestKind, ResponseCode,
    ServerOptions, bind_listener, load_data,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

/// How long workers get to exit after SHUTDOWN before they are killed
const WORKER_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {e}"))?
    };

    match cli.command() {
        Command::Serve {
            port,
            workers,
            inline,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(workers) = workers {
                config.cluster.workers = workers;
            }
            if inline {
                config.cluster.launch = LaunchMode::Inline;
            }
            config.validate().context("Invalid configuration")?;
            run_coordinator(&cli, config).await
        }
        Command::Worker { rank, pool_size } => {
            config.validate().context("Invalid configuration")?;
            let span = info_span!("worker", rank);
            run_worker(config, Rank::new(rank), PoolSize::new(pool_size))
                .instrument(span)
                .await
        }
        Command::Client {
            address,
            request,
            data,
        } => run_client(address, request, data).await,
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins over everything; otherwise `DEBUG=1` forces debug and the
/// `-v` count picks the level. Stdout stays free for the worker port
/// announcement and client output.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if std::env::var("DEBUG").is_ok_and(|v| v == "1") {
            return EnvFilter::new("debug");
        }
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Worker ranks behind the coordinator
enum WorkerPool {
    Processes(Arc<TcpClusterTransport>),
    Inline(Vec<JoinHandle<Result<WorkerSummary, DistributionError>>>),
}

impl WorkerPool {
    async fn wait(self, grace: Duration) {
        match self {
            WorkerPool::Processes(transport) => transport.wait_for_workers(grace).await,
            WorkerPool::Inline(handles) => {
                for handle in handles {
                    let abort = handle.abort_handle();
                    match tokio::time::timeout(grace, handle).await {
                        Ok(Ok(Ok(summary))) => debug!(
                            "Inline worker finished {} reviews ({} exams)",
                            summary.reviews, summary.exams
                        ),
                        Ok(Ok(Err(e))) => warn!("Inline worker failed: {}", e),
                        Ok(Err(e)) => warn!("Inline worker panicked: {}", e),
                        Err(_) => {
                            warn!("Inline worker still running after {:?}, aborting", grace);
                            abort.abort();
                        }
                    }
                }
            }
        }
    }
}

fn worker_launch(cli: &Cli, config: &FileConfig) -> Result<WorkerLaunch> {
    let mut launch = WorkerLaunch::current_exe(config.cluster.workers, config.cluster.max_frame_size)?;
    if cli.no_config {
        launch = launch.arg("--no-config");
    } else if let Some(path) = &cli.config {
        launch = launch.arg("--config").arg(path.clone());
    }
    for _ in 0..cli.verbose {
        launch = launch.arg("-v");
    }
    Ok(launch)
}

async fn start_workers(
    cli: &Cli,
    config: &FileConfig,
) -> Result<(Arc<dyn ClusterTransport>, WorkerPool)> {
    match config.cluster.launch {
        LaunchMode::Inline => {
            let mut endpoints = LocalCluster::endpoints(config.cluster.pool_size());
            let coordinator = endpoints.remove(0);

            let handles = endpoints
                .into_iter()
                .map(|endpoint| {
                    let span = info_span!("worker", rank = endpoint.rank().get());
                    let link = WorkerLink::new(Arc::new(endpoint), config.cluster.tags);
                    let worker = RunWorkerUseCase::new(link, EvaluationEngine::new(config.scoring));
                    tokio::spawn(worker.run().instrument(span))
                })
                .collect();

            info!("Started {} inline workers", config.cluster.workers);
            let coordinator: Arc<dyn ClusterTransport> = Arc::new(coordinator);
            Ok((coordinator, WorkerPool::Inline(handles)))
        }
        LaunchMode::Process => {
            let launch = worker_launch(cli, config)?;
            let transport = Arc::new(
                TcpClusterTransport::launch(&launch)
                    .await
                    .context("Failed to start worker processes")?,
            );
            info!("Started {} worker processes", config.cluster.workers);
            let coordinator: Arc<dyn ClusterTransport> = transport.clone();
            Ok((coordinator, WorkerPool::Processes(transport)))
        }
    }
}

fn review_logger(config: &FileConfig) -> Arc<dyn ReviewLogger> {
    let logger = config
        .logging
        .review_log
        .as_deref()
        .and_then(|path| JsonlReviewLogger::new(path));
    match logger {
        Some(logger) => {
            info!("Review log: {}", logger.path().display());
            Arc::new(logger)
        }
        None => Arc::new(NoReviewLogger),
    }
}

async fn run_coordinator(cli: &Cli, config: FileConfig) -> Result<()> {
    info!("Starting ScoreHive coordinator");

    // === Dependency Injection ===
    let (transport, pool) = start_workers(cli, &config).await?;
    let review_logger = review_logger(&config);

    let coordinator = Arc::new(
        WorkCoordinator::new(transport, config.cluster.tags)
            .with_review_logger(Arc::clone(&review_logger)),
    );
    let stop = CancellationToken::new();
    let handler = RequestHandler::new(coordinator, stop.clone()).with_review_logger(review_logger);

    let listener = bind_listener(
        &config.server.host,
        config.server.port,
        config.server.backlog,
    )
    .await?;
    let server = ProtocolServer::new(
        listener,
        handler,
        stop.clone(),
        ServerOptions {
            max_message_size: config.server.max_message_size,
            pause: config.server.pause(),
        },
    );
    info!("Listening on {}", config.server.bind_address());

    // Ctrl-C takes the same path as SHUTDOWN
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            stop.cancel();
        }
    });

    let outcome = server.run().await;
    pool.wait(WORKER_GRACE).await;

    let summary = outcome?;
    info!(
        "Coordinator stopped after {} connections",
        summary.connections
    );
    Ok(())
}

async fn run_worker(config: FileConfig, rank: Rank, pool: PoolSize) -> Result<()> {
    if rank.is_coordinator() || !pool.contains(rank) {
        bail!("Rank {rank} is not a worker rank of a pool of size {pool}");
    }
    info!("Worker {} started", rank);

    let transport = TcpClusterTransport::listen(rank, pool, config.cluster.max_frame_size)
        .await
        .context("Failed to connect to the coordinator")?;
    let link = WorkerLink::new(Arc::new(transport), config.cluster.tags);

    let summary = RunWorkerUseCase::new(link, EvaluationEngine::new(config.scoring))
        .run()
        .await?;
    info!(
        "Worker {} received shutdown signal ({} reviews, {} exams)",
        rank, summary.reviews, summary.exams
    );
    Ok(())
}

async fn run_client(address: String, request: RequestKind, data: Option<String>) -> Result<()> {
    let data = match data {
        Some(arg) => {
            load_data(&arg).with_context(|| format!("Failed to read request data from {arg}"))?
        }
        None => String::new(),
    };

    let response = ProtocolClient::new(address)
        .send(&request.into_request(data))
        .await?;

    match response.code {
        ResponseCode::Ok => {
            println!("{}", response.data);
            Ok(())
        }
        ResponseCode::Error => bail!("Server returned ERROR: {}", response.data),
    }
}
