//! cardwatch-scheduler — consumes `scheduler-requests`, fans out jobs.
//!
//! Binds the PUSH side of the jobs pipeline (workers connect PULL and
//! get round-robin delivery), forwards worker requeues back into the
//! pipeline, and registers the recurring jobs.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use cardwatch_bus::broker::health_check;
use cardwatch_bus::{
    BusConfig, Channel, ChannelListener, MemoryDeadLetter, PipelineReceiver, PipelineSender,
    ZmqPipelineReceiver, ZmqPipelineSender, ZmqPublisher, ZmqSubscriber,
};
use cardwatch_catalog::ScryfallFeed;
use cardwatch_queue::{PipelineJobQueue, RecurringScheduler, TaskDispatcher};
use cardwatch_scheduler::{register_recurring, request_handlers, SchedulerContext};
use cardwatch_store::{
    AvailabilityCache, HttpFetcher, MemoryUserDirectory, RetryPolicy, SetCodeLookup, StoreRegistry,
};
use cardwatch_worker::{build_registry, TaskContext, WorkerSettings};

/// Cardwatch scheduler.
#[derive(Parser, Debug)]
#[command(name = "cardwatch-scheduler", version, about)]
struct Cli {
    /// Path to cardwatch.toml config file.
    #[arg(long, env = "CARDWATCH_CONFIG", default_value = "config/cardwatch.toml")]
    config: String,

    /// Broker health check timeout in seconds.
    #[arg(long, env = "CARDWATCH_HEALTH_TIMEOUT", default_value_t = 5)]
    health_timeout: u64,

    /// Listener join timeout on shutdown, in seconds.
    #[arg(long, env = "CARDWATCH_SHUTDOWN_TIMEOUT", default_value_t = 5)]
    shutdown_timeout: u64,
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

    // Jobs pipeline: this role is the stable PUSH endpoint.
    let jobs_tx: Arc<ZmqPipelineSender> =
        Arc::new(ZmqPipelineSender::bind(&bus.jobs.endpoint).await?);
    let queue = Arc::new(PipelineJobQueue::new(jobs_tx.clone()));

    // The same task definitions the worker executes, so enqueue-time
    // task-id validation always agrees with the execute side.
    let fetcher = Arc::new(HttpFetcher::new(RetryPolicy::default())?);
    let users: Arc<MemoryUserDirectory> = Arc::new(MemoryUserDirectory::new());
    let publisher = Arc::new(ZmqPublisher::connect(&bus.broker.frontend).await?);
    let task_ctx = Arc::new(TaskContext {
        stores: Arc::new(StoreRegistry::from_profiles(
            settings.stores,
            fetcher,
            Arc::new(SetCodeLookup::new()),
        )),
        cache: Arc::new(AvailabilityCache::new()),
        users: users.clone(),
        publisher,
        feed: Arc::new(ScryfallFeed::new()?),
        queue: queue.clone(),
    });
    let registry = Arc::new(build_registry(task_ctx));

    let dispatcher = Arc::new(TaskDispatcher::new(registry, queue));
    let recurring = RecurringScheduler::new(dispatcher.clone());
    register_recurring(&recurring).await;

    // Requeue return path: workers PUSH interrupted jobs here; forward
    // them back into the main pipeline.
    let requeue_rx = ZmqPipelineReceiver::bind(&bus.jobs.requeue).await?;
    let forward_tx = jobs_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match requeue_rx.recv().await {
                Ok(envelope) => {
                    if let Err(e) = forward_tx.send(envelope).await {
                        warn!(error = %e, "failed to forward requeued job");
                    }
                }
                Err(e) => {
                    info!(error = %e, "requeue forwarder exiting");
                    break;
                }
            }
        }
    });

    // Request listener.
    let ctx = Arc::new(SchedulerContext {
        dispatcher,
        users,
    });
    let subscriber = ZmqSubscriber::connect(&bus.broker.backend).await?;
    let listener = ChannelListener::new(
        Channel::SchedulerRequests,
        request_handlers(ctx),
        Arc::new(MemoryDeadLetter::new()),
    );
    let handle = listener.spawn(subscriber).await?;

    info!("cardwatch-scheduler started");
    wait_for_signal().await;
    info!("shutdown signal received");

    handle.stop(Duration::from_secs(cli.shutdown_timeout)).await;
    recurring.shutdown().await;
    forwarder.abort();
    info!("cardwatch-scheduler exited cleanly");

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
