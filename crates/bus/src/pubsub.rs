use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::channel::Channel;
use crate::error::BusError;
use crate::message::Envelope;
use crate::traits::{EventPublisher, EventSubscriber, RawMessage};
use crate::transport::Transport;

/// ZeroMQ PUB socket publisher that connects to the broker's frontend.
///
/// Messages are sent as two-frame ZMQ messages:
/// 1. Channel name (used by SUB sockets for prefix filtering)
/// 2. JSON-encoded [`Envelope`]
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Create a new publisher that connects to the broker's frontend endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PUB socket to broker frontend");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Create a new publisher that binds to the given endpoint.
    ///
    /// Use this for direct PUB/SUB without a broker (publisher binds,
    /// subscribers connect).
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, BusError> {
        transport
            .ensure_ipc_dir()
            .map_err(|e| BusError::Transport(e.to_string()))?;
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PUB socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    /// Publish an envelope as a two-frame ZMQ message: [channel, envelope].
    async fn publish(&self, channel: Channel, envelope: Envelope) -> Result<(), BusError> {
        let body = envelope.to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(channel.as_str());
        zmq_msg.push_back(body.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(channel = %channel, name = %envelope.name, "published message");
        Ok(())
    }
}

/// ZeroMQ SUB socket subscriber that connects to the broker's backend.
///
/// Receives the two-frame [channel, envelope] messages produced by
/// [`ZmqPublisher`] and hands them out undecoded — the channel listener
/// owns envelope decoding so failed bodies can be dead-lettered.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    /// Create a new subscriber that connects to the broker's backend endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting SUB socket to broker backend");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, channel: Channel) -> Result<(), BusError> {
        let mut socket = self.socket.lock().await;
        socket.subscribe(channel.as_str()).await?;
        info!(channel = %channel, "subscribed");
        Ok(())
    }

    /// Receive the next message. Blocks until a message matching a
    /// subscription arrives.
    async fn recv(&self) -> Result<RawMessage, BusError> {
        let mut socket = self.socket.lock().await;
        let zmq_msg = socket.recv().await?;

        // We always publish two frames [channel, envelope], but handle a
        // single-frame message gracefully by treating the whole frame as
        // the body.
        let frames: Vec<_> = zmq_msg.iter().collect();
        match frames.as_slice() {
            [channel, body, ..] => Ok(RawMessage {
                channel: String::from_utf8_lossy(channel.as_ref()).into_owned(),
                body: body.as_ref().to_vec(),
            }),
            [body] => Ok(RawMessage {
                channel: String::new(),
                body: body.as_ref().to_vec(),
            }),
            [] => Err(BusError::Transport("empty ZMQ message".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_frame_construction() {
        let mut msg = ZmqMessage::from(Channel::WorkerResults.as_str());
        msg.push_back(b"{}".to_vec().into());

        let frames: Vec<_> = msg.iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), b"worker-results");
        assert_eq!(frames[1].as_ref(), b"{}");
    }

    #[tokio::test]
    async fn direct_pub_sub_roundtrip() {
        // Direct PUB/SUB without broker: publisher binds, subscriber connects.
        let transport = Transport::tcp("127.0.0.1", 25700);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let subscriber = ZmqSubscriber::connect(&transport).await.unwrap();
        subscriber.subscribe(Channel::WorkerResults).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let env = Envelope::new("availability_result", &serde_json::json!({"store": "a"})).unwrap();
        let correlation_id = env.correlation_id;
        publisher
            .publish(Channel::WorkerResults, env)
            .await
            .unwrap();

        let raw = tokio::time::timeout(std::time::Duration::from_secs(2), subscriber.recv())
            .await
            .expect("timed out waiting for message")
            .unwrap();

        assert_eq!(raw.channel, "worker-results");
        let decoded = Envelope::from_bytes(&raw.body).unwrap();
        assert_eq!(decoded.name, "availability_result");
        assert_eq!(decoded.correlation_id, correlation_id);
    }

    #[tokio::test]
    async fn channel_filtering_works() {
        // A subscriber on worker-results must not see scheduler-requests.
        let transport = Transport::tcp("127.0.0.1", 25701);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let subscriber = ZmqSubscriber::connect(&transport).await.unwrap();
        subscriber.subscribe(Channel::WorkerResults).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let request = Envelope::new("availability_request", &serde_json::json!({})).unwrap();
        publisher
            .publish(Channel::SchedulerRequests, request)
            .await
            .unwrap();

        let result = Envelope::new("availability_result", &serde_json::json!({})).unwrap();
        let wanted_id = result.correlation_id;
        publisher.publish(Channel::WorkerResults, result).await.unwrap();

        let raw = tokio::time::timeout(std::time::Duration::from_secs(2), subscriber.recv())
            .await
            .expect("timed out")
            .unwrap();
        let decoded = Envelope::from_bytes(&raw.body).unwrap();
        assert_eq!(decoded.correlation_id, wanted_id);

        // The filtered request never arrives.
        let extra = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            subscriber.recv(),
        )
        .await;
        assert!(extra.is_err(), "should not receive filtered message");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        // PUB/SUB is fan-out: all subscribers get every matching message.
        let transport = Transport::tcp("127.0.0.1", 25702);

        let publisher = ZmqPublisher::bind(&transport).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let sub1 = ZmqSubscriber::connect(&transport).await.unwrap();
        let sub2 = ZmqSubscriber::connect(&transport).await.unwrap();
        sub1.subscribe(Channel::WorkerResults).await.unwrap();
        sub2.subscribe(Channel::WorkerResults).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let env = Envelope::new("availability_result", &42u64).unwrap();
        let cid = env.correlation_id;
        publisher.publish(Channel::WorkerResults, env).await.unwrap();

        for sub in [&sub1, &sub2] {
            let raw = tokio::time::timeout(std::time::Duration::from_secs(2), sub.recv())
                .await
                .expect("subscriber timed out")
                .unwrap();
            let decoded = Envelope::from_bytes(&raw.body).unwrap();
            assert_eq!(decoded.correlation_id, cid);
            assert_eq!(decoded.decode::<u64>().unwrap(), 42);
        }
    }
}
