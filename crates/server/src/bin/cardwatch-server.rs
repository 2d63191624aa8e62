//! cardwatch-server — client-facing role, consumes `worker-results`.
//!
//! Writes availability results into the short-TTL cache, refreshes the
//! shared snapshot and fans out change notifications, and applies the
//! streamed catalog messages to the catalog store.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use cardwatch_bus::broker::health_check;
use cardwatch_bus::{BusConfig, Channel, ChannelListener, MemoryDeadLetter, ZmqSubscriber};
use cardwatch_catalog::MemoryCatalog;
use cardwatch_server::{result_handlers, AvailabilityTracker, LogNotifier, ServerContext};
use cardwatch_store::{AvailabilityCache, MemoryUserDirectory, SnapshotStore};

/// Cardwatch server.
#[derive(Parser, Debug)]
#[command(name = "cardwatch-server", version, about)]
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

    // Broker unavailability is the one unrecoverable startup condition.
    health_check(&bus.broker.health, Duration::from_secs(cli.health_timeout)).await?;

    let users = Arc::new(MemoryUserDirectory::new());
    let notifier = Arc::new(LogNotifier);
    let tracker = Arc::new(AvailabilityTracker::new(
        Arc::new(AvailabilityCache::new()),
        Arc::new(SnapshotStore::new()),
        users,
        notifier.clone(),
    ));
    let ctx = Arc::new(ServerContext {
        tracker,
        catalog: Arc::new(MemoryCatalog::new()),
        notifier,
    });

    let subscriber = ZmqSubscriber::connect(&bus.broker.backend).await?;
    let listener = ChannelListener::new(
        Channel::WorkerResults,
        result_handlers(ctx),
        Arc::new(MemoryDeadLetter::new()),
    );
    let handle = listener.spawn(subscriber).await?;

    info!("cardwatch-server started");
    wait_for_signal().await;
    info!("shutdown signal received");

    handle.stop(Duration::from_secs(cli.shutdown_timeout)).await;
    info!("cardwatch-server exited cleanly");

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
