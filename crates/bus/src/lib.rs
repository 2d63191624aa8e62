pub mod broker;
pub mod channel;
pub mod config;
pub mod deadletter;
pub mod error;
pub mod listener;
pub mod message;
pub mod messages;
pub mod pipeline;
pub mod pubsub;
pub mod traits;
pub mod transport;

pub use broker::{BrokerSockets, EventBroker};
pub use channel::Channel;
pub use config::BusConfig;
pub use deadletter::{DeadLetterSink, MemoryDeadLetter};
pub use error::BusError;
pub use listener::{ChannelListener, HandlerTable, ListenerHandle};
pub use message::Envelope;
pub use messages::names;
pub use pipeline::{ZmqPipelineReceiver, ZmqPipelineSender};
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use traits::{EventPublisher, EventSubscriber, PipelineReceiver, PipelineSender, RawMessage};
pub use transport::Transport;
