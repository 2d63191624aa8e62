//! cardwatch-worker — executes queued jobs, one at a time.
//!
//! Pulls from the jobs pipeline, runs scraping and catalog tasks, and
//! publishes results on `worker-results`. Run more instances for
//! horizontal scale.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use cardwatch_bus::broker::health_check;
use cardwatch_bus::{BusConfig, ZmqPipelineReceiver, ZmqPipelineSender, ZmqPublisher};
use cardwatch_catalog::ScryfallFeed;
use cardwatch_queue::{PipelineJobConsumer, PipelineJobQueue, TaskExecutor};
use cardwatch_store::{
    AvailabilityCache, HttpFetcher, MemoryUserDirectory, RetryPolicy, SetCodeLookup, StoreRegistry,
};
use cardwatch_worker::{build_registry, TaskContext, WorkerLoop, WorkerSettings};

/// Cardwatch job worker.
#[derive(Parser, Debug)]
#[command(name = "cardwatch-worker", version, about)]
struct Cli {
    /// Path to cardwatch.toml config file.
    #[arg(long, env = "CARDWATCH_CONFIG", default_value = "config/cardwatch.toml")]
    config: String,

    /// Broker health check timeout in seconds.
    #[arg(long, env = "CARDWATCH_HEALTH_TIMEOUT", default_value_t = 5)]
    health_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let bus = match BusConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded cardwatch config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load config, using local defaults");
            BusConfig::local()
        }
    };
    let settings = WorkerSettings::from_file(&cli.config).unwrap_or_default();

    // Broker unavailability is the one unrecoverable startup condition.
    health_check(&bus.broker.health, Duration::from_secs(cli.health_timeout)).await?;

    let publisher = Arc::new(ZmqPublisher::connect(&bus.broker.frontend).await?);
    let receiver = ZmqPipelineReceiver::connect(&bus.jobs.endpoint).await?;
    let requeue: Arc<ZmqPipelineSender> =
        Arc::new(ZmqPipelineSender::connect(&bus.jobs.requeue).await?);
    let consumer = Arc::new(PipelineJobConsumer::new(Box::new(receiver), requeue.clone()));

    let fetcher = Arc::new(HttpFetcher::new(RetryPolicy::default())?);
    let stores = Arc::new(StoreRegistry::from_profiles(
        settings.stores,
        fetcher,
        Arc::new(SetCodeLookup::new()),
    ));

    let ctx = Arc::new(TaskContext {
        stores,
        cache: Arc::new(AvailabilityCache::new()),
        users: Arc::new(MemoryUserDirectory::new()),
        publisher: publisher.clone(),
        feed: Arc::new(ScryfallFeed::new()?),
        queue: Arc::new(PipelineJobQueue::new(requeue)),
    });
    let executor = TaskExecutor::new(Arc::new(build_registry(ctx)));

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.notify_waiters();
        });
    }

    info!("cardwatch-worker starting");
    WorkerLoop::new(consumer, executor, publisher, shutdown)
        .run()
        .await;
    info!("cardwatch-worker exited cleanly");

    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
