//! cardwatch-broker — central PUB/SUB rendezvous for the process roles.
//!
//! Publishers (server, worker, catalog pipeline) connect to the frontend;
//! subscribers (server, scheduler) connect to the backend. The broker
//! forwards every message, preserving per-channel publish order.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use cardwatch_bus::broker::EventBroker;
use cardwatch_bus::{BrokerSockets, BusConfig};

/// Cardwatch message broker.
#[derive(Parser, Debug)]
#[command(name = "cardwatch-broker", version, about)]
struct Cli {
    /// Path to cardwatch.toml config file.
    #[arg(long, env = "CARDWATCH_CONFIG", default_value = "config/cardwatch.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match BusConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded cardwatch config");
            cfg
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %cli.config, "failed to load config, using local defaults");
            BusConfig::local()
        }
    };

    let sockets = BrokerSockets {
        frontend: config.broker.frontend,
        backend: config.broker.backend,
        health: config.broker.health,
    };

    let broker = Arc::new(EventBroker::new(sockets));
    let shutdown = broker.shutdown_handle();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        shutdown.notify_waiters();
    });

    info!("cardwatch-broker starting");
    broker.run().await?;
    info!("cardwatch-broker exited cleanly");

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
