use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::{PullSocket, PushSocket, Socket, SocketRecv, SocketSend};

use crate::error::BusError;
use crate::message::Envelope;
use crate::traits::{PipelineReceiver, PipelineSender};
use crate::transport::Transport;

/// PUSH socket sender distributing job envelopes to downstream PULL
/// workers.
///
/// Envelopes are delivered round-robin across all connected receivers,
/// which is what gives horizontal worker scaling without in-process job
/// parallelism. When ZeroMQ's high-water mark is reached, `send` blocks
/// until queue space frees up (backpressure).
pub struct ZmqPipelineSender {
    socket: Mutex<PushSocket>,
}

impl ZmqPipelineSender {
    /// Create a PUSH sender that connects to the given endpoint.
    ///
    /// Senders connect (not bind): producers are ephemeral relative to the
    /// stable worker pull endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PushSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PUSH socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a PUSH sender that binds to the given endpoint.
    ///
    /// Use bind when this sender is the stable endpoint (one producer,
    /// many connecting PULL workers).
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        let mut socket = PushSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PUSH socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl PipelineSender for ZmqPipelineSender {
    async fn send(&self, envelope: Envelope) -> Result<(), BusError> {
        let bytes = envelope.to_bytes()?;
        let mut socket = self.socket.lock().await;
        socket.send(bytes.into()).await?;
        debug!(name = %envelope.name, "pushed job envelope");
        Ok(())
    }
}

/// PULL socket receiver for job envelopes.
///
/// Multiple receivers connected to the same pipeline get load-balanced
/// delivery from the upstream PUSH socket.
pub struct ZmqPipelineReceiver {
    socket: Mutex<PullSocket>,
}

impl ZmqPipelineReceiver {
    /// Create a PULL receiver that binds to the given endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        transport
            .remove_stale_socket()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        let mut socket = PullSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PULL socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a PULL receiver that connects to the given endpoint.
    ///
    /// Use connect when the PUSH sender is the stable endpoint and this
    /// receiver is one of many ephemeral workers.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PullSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PULL socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl PipelineReceiver for ZmqPipelineReceiver {
    async fn recv(&self) -> Result<Envelope, BusError> {
        let mut socket = self.socket.lock().await;
        let raw = socket.recv().await?;
        let bytes = raw
            .get(0)
            .ok_or_else(|| BusError::Transport("empty ZMQ frame".into()))?;
        Envelope::from_bytes(bytes.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_pull_single_envelope() {
        let transport = Transport::tcp("127.0.0.1", 25600);

        // Receiver binds first (stable endpoint)
        let receiver = ZmqPipelineReceiver::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let sender = ZmqPipelineSender::connect(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let env = Envelope::new("job", &serde_json::json!({"task_id": "check_single_card"}))
            .unwrap();
        let cid = env.correlation_id;
        sender.send(env).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.name, "job");
        assert_eq!(received.correlation_id, cid);
    }

    #[tokio::test]
    async fn push_to_multiple_pull_load_balances() {
        let transport = Transport::tcp("127.0.0.1", 25601);

        // One PUSH binds (stable producer), two PULL workers connect.
        let sender = ZmqPipelineSender::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let rx1 = ZmqPipelineReceiver::connect(&transport).await.unwrap();
        let rx2 = ZmqPipelineReceiver::connect(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let total = 10u32;
        for i in 0..total {
            let env = Envelope::new("job", &i).unwrap();
            sender.send(env).await.unwrap();
        }

        let (tx, mut results) = tokio::sync::mpsc::channel::<u32>(20);

        for (worker_id, rx) in [(1u32, rx1), (2u32, rx2)] {
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    match tokio::time::timeout(
                        std::time::Duration::from_millis(500),
                        rx.recv(),
                    )
                    .await
                    {
                        Ok(Ok(_env)) => {
                            let _ = tx.send(worker_id).await;
                        }
                        _ => break,
                    }
                }
            });
        }
        drop(tx);

        let mut counts = [0u32; 2];
        while let Some(worker_id) = results.recv().await {
            counts[(worker_id - 1) as usize] += 1;
        }

        assert_eq!(counts[0] + counts[1], total, "all jobs should be received");
        assert!(counts[0] > 0, "worker 1 should receive some jobs");
        assert!(counts[1] > 0, "worker 2 should receive some jobs");
    }
}
