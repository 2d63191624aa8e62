use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use zeromq::prelude::*;
use zeromq::{PubSocket, RepSocket, SubSocket};

use crate::error::BusError;
use crate::transport::Transport;

/// Counters collected by the broker while proxying.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Total messages forwarded through the proxy.
    pub total_messages: AtomicU64,
    /// Per-channel message counts.
    pub channel_counts: Mutex<HashMap<String, u64>>,
}

impl BrokerMetrics {
    /// Snapshot of total forwarded messages.
    pub fn total(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }
}

/// Socket endpoints for the event broker.
#[derive(Debug, Clone)]
pub struct BrokerSockets {
    /// Frontend endpoint where publishers connect (broker binds SUB here).
    pub frontend: Transport,
    /// Backend endpoint where subscribers connect (broker binds PUB here).
    pub backend: Transport,
    /// Health check endpoint (REP socket for liveness probes).
    pub health: Transport,
}

impl BrokerSockets {
    /// Local IPC broker endpoints.
    pub fn local() -> Self {
        Self {
            frontend: Transport::ipc("broker-frontend"),
            backend: Transport::ipc("broker-backend"),
            health: Transport::ipc("broker-health"),
        }
    }

    /// TCP broker endpoints on one host.
    pub fn tcp(host: &str, frontend_port: u16, backend_port: u16, health_port: u16) -> Self {
        Self {
            frontend: Transport::tcp(host, frontend_port),
            backend: Transport::tcp(host, backend_port),
            health: Transport::tcp(host, health_port),
        }
    }
}

impl Default for BrokerSockets {
    fn default() -> Self {
        Self::local()
    }
}

/// Central PUB/SUB rendezvous for the three process roles.
///
/// - Publishers connect to the **frontend** (SUB socket the broker binds).
/// - Subscribers connect to the **backend** (PUB socket the broker binds).
/// - Messages received on the frontend are forwarded verbatim to the
///   backend, preserving per-channel publish order.
///
/// `zeromq` 0.4 provides no XPUB/XSUB socket types, so the proxy is
/// emulated with PUB+SUB; the broker subscribes to all channels ("").
pub struct EventBroker {
    sockets: BrokerSockets,
    metrics: Arc<BrokerMetrics>,
    shutdown: Arc<Notify>,
}

impl EventBroker {
    pub fn new(sockets: BrokerSockets) -> Self {
        Self {
            sockets,
            metrics: Arc::new(BrokerMetrics::default()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    /// Handle used to signal the broker to shut down gracefully.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the broker proxy loop.
    ///
    /// Binds the SUB frontend, PUB backend, and REP health sockets, then
    /// forwards frontend messages to the backend until shutdown is
    /// signalled. Forwarding errors for a single message are logged and
    /// skipped; the proxy keeps running.
    pub async fn run(&self) -> Result<(), BusError> {
        for t in [
            &self.sockets.frontend,
            &self.sockets.backend,
            &self.sockets.health,
        ] {
            t.ensure_ipc_dir()
                .map_err(|e| BusError::Transport(e.to_string()))?;
            t.remove_stale_socket()
                .map_err(|e| BusError::Transport(e.to_string()))?;
        }

        let mut frontend = SubSocket::new();
        frontend.bind(&self.sockets.frontend.endpoint()).await?;
        frontend.subscribe("").await?;
        info!(
            endpoint = %self.sockets.frontend.endpoint(),
            "broker frontend (SUB) bound — publishers connect here"
        );

        let mut backend = PubSocket::new();
        backend.bind(&self.sockets.backend.endpoint()).await?;
        info!(
            endpoint = %self.sockets.backend.endpoint(),
            "broker backend (PUB) bound — subscribers connect here"
        );

        let mut health = RepSocket::new();
        health.bind(&self.sockets.health.endpoint()).await?;
        info!(endpoint = %self.sockets.health.endpoint(), "broker health (REP) bound");

        loop {
            tokio::select! {
                msg = frontend.recv() => {
                    match msg {
                        Ok(zmq_msg) => {
                            let channel = zmq_msg
                                .get(0)
                                .map(|f| String::from_utf8_lossy(f.as_ref()).into_owned())
                                .unwrap_or_default();

                            if let Err(e) = backend.send(zmq_msg).await {
                                warn!(channel = %channel, error = %e, "failed to forward message");
                                continue;
                            }

                            self.metrics.total_messages.fetch_add(1, Ordering::Relaxed);
                            let mut counts = self.metrics.channel_counts.lock().await;
                            *counts.entry(channel.clone()).or_insert(0) += 1;
                            drop(counts);
                            debug!(channel = %channel, "forwarded message");
                        }
                        Err(e) => {
                            warn!(error = %e, "frontend recv error");
                        }
                    }
                }
                ping = health.recv() => {
                    match ping {
                        Ok(_) => {
                            if let Err(e) = health.send("ok".into()).await {
                                warn!(error = %e, "health reply failed");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "health recv error");
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("broker shutdown signalled");
                    break;
                }
            }
        }

        info!(total = self.metrics.total(), "broker stopped");
        Ok(())
    }
}

/// Ping a broker's health socket once. Used by roles as a startup check —
/// broker unavailability at startup is surfaced here rather than raised
/// into business logic later.
pub async fn health_check(
    health: &Transport,
    timeout: std::time::Duration,
) -> Result<(), BusError> {
    let mut socket = zeromq::ReqSocket::new();
    socket.connect(&health.endpoint()).await?;
    socket.send("ping".into()).await?;
    tokio::time::timeout(timeout, socket.recv())
        .await
        .map_err(|_| BusError::Transport(format!("broker health check timed out at {health}")))?
        .map_err(BusError::Zmq)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::message::Envelope;
    use crate::pubsub::{ZmqPublisher, ZmqSubscriber};
    use crate::traits::{EventPublisher, EventSubscriber};

    #[tokio::test]
    async fn broker_roundtrip() {
        let sockets = BrokerSockets::tcp("127.0.0.1", 25710, 25711, 25712);

        let broker = Arc::new(EventBroker::new(sockets.clone()));
        let broker_task = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let publisher = ZmqPublisher::connect(&sockets.frontend).await.unwrap();
        let subscriber = ZmqSubscriber::connect(&sockets.backend).await.unwrap();
        subscriber.subscribe(Channel::WorkerResults).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let env = Envelope::new(
            "availability_result",
            &serde_json::json!({"store": "authority_games", "card": "Sol Ring", "items": []}),
        )
        .unwrap();
        let cid = env.correlation_id;
        publisher.publish(Channel::WorkerResults, env).await.unwrap();

        let raw = tokio::time::timeout(std::time::Duration::from_secs(3), subscriber.recv())
            .await
            .expect("timed out waiting for broker-forwarded message")
            .unwrap();
        let decoded = Envelope::from_bytes(&raw.body).unwrap();
        assert_eq!(decoded.correlation_id, cid);
        assert_eq!(raw.channel, "worker-results");

        broker.shutdown_handle().notify_waiters();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), broker_task).await;
    }

    #[tokio::test]
    async fn health_check_answers_ok() {
        let sockets = BrokerSockets::tcp("127.0.0.1", 25720, 25721, 25722);

        let broker = Arc::new(EventBroker::new(sockets.clone()));
        let broker_task = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        health_check(&sockets.health, std::time::Duration::from_secs(2))
            .await
            .expect("health check should succeed against a running broker");

        broker.shutdown_handle().notify_waiters();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), broker_task).await;
    }
}
