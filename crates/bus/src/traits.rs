use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::BusError;
use crate::message::Envelope;

/// A message as it came off the wire: channel topic plus raw envelope
/// bytes. Decoding is left to the consumer so undecodable bodies can be
/// dead-lettered verbatim.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub channel: String,
    pub body: Vec<u8>,
}

/// Publishes envelopes to one of the logical channels via PUB/SUB.
///
/// Delivery is fan-out to currently-subscribed listeners only, in publish
/// order per channel; there is no delivery guarantee to a listener that
/// was down at publish time.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: Channel, envelope: Envelope) -> Result<(), BusError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, channel: Channel, envelope: Envelope) -> Result<(), BusError> {
        (**self).publish(channel, envelope).await
    }
}

/// Subscribes to one or more channels via PUB/SUB.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to a channel. Multiple subscriptions can be active.
    async fn subscribe(&self, channel: Channel) -> Result<(), BusError>;

    /// Receive the next message. Blocks until one arrives.
    async fn recv(&self) -> Result<RawMessage, BusError>;
}

/// Sends job envelopes through the PUSH/PULL work pipeline.
///
/// Items are distributed round-robin across connected receivers; a full
/// queue applies backpressure on `send`.
#[async_trait]
pub trait PipelineSender: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), BusError>;
}

/// Blanket implementation so `Arc<dyn PipelineSender>` can be used directly.
#[async_trait]
impl<T: PipelineSender + ?Sized> PipelineSender for Arc<T> {
    async fn send(&self, envelope: Envelope) -> Result<(), BusError> {
        (**self).send(envelope).await
    }
}

/// Receives job envelopes from the PUSH/PULL work pipeline.
#[async_trait]
pub trait PipelineReceiver: Send + Sync {
    /// Pull the next envelope. Blocks until one is available.
    async fn recv(&self) -> Result<Envelope, BusError>;
}
