//! Per-channel background listeners.
//!
//! Each consuming role runs one [`ChannelListener`] per subscribed
//! channel. The listener blocks on the channel's read, decodes the
//! envelope, and dispatches through a name → handler table. Failures are
//! contained per message: the raw body is pushed to the channel's
//! dead-letter list and the loop continues.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channel::Channel;
use crate::deadletter::DeadLetterSink;
use crate::error::BusError;
use crate::message::Envelope;
use crate::traits::{EventSubscriber, RawMessage};

/// Boxed async function that handles one decoded envelope.
pub type EnvelopeHandler =
    Box<dyn Fn(Envelope) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send>> + Send + Sync>;

/// Static name → handler dispatch table, built once at role startup.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, EnvelopeHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a message name.
    pub fn on<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BusError>> + Send + 'static,
    {
        self.handlers
            .insert(name.into(), Box::new(move |env| Box::pin(handler(env))));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get(&self, name: &str) -> Option<&EnvelopeHandler> {
        self.handlers.get(name)
    }
}

/// Background listener for one channel.
pub struct ChannelListener {
    channel: Channel,
    table: HandlerTable,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl ChannelListener {
    pub fn new(
        channel: Channel,
        table: HandlerTable,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            channel,
            table,
            dead_letters,
        }
    }

    /// Subscribe and start the listen loop as a background task.
    ///
    /// The returned [`ListenerHandle`] stops the loop and joins the task
    /// with a bounded timeout.
    pub async fn spawn<S>(self, subscriber: S) -> Result<ListenerHandle, BusError>
    where
        S: EventSubscriber + 'static,
    {
        subscriber.subscribe(self.channel).await?;
        info!(channel = %self.channel, handlers = self.table.len(), "listener subscribed");

        let channel = self.channel;
        let shutdown = Arc::new(Notify::new());
        let loop_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    raw = subscriber.recv() => {
                        match raw {
                            Ok(raw) => self.process(raw).await,
                            Err(e) => {
                                // The subscription was closed or the
                                // transport failed; either way the read
                                // loop is over.
                                info!(channel = %channel, error = %e, "listener loop exiting");
                                break;
                            }
                        }
                    }
                    _ = loop_shutdown.notified() => {
                        info!(channel = %channel, "listener shutdown signalled");
                        break;
                    }
                }
            }
        });

        Ok(ListenerHandle {
            channel,
            shutdown,
            handle,
        })
    }

    /// Handle one raw message. Every failure path ends in the dead-letter
    /// list, never in a crashed loop.
    async fn process(&self, raw: RawMessage) {
        let envelope = match Envelope::from_bytes(&raw.body) {
            Ok(env) => env,
            Err(e) => {
                error!(channel = %self.channel, error = %e, "undecodable message");
                self.dead_letters
                    .push(&self.channel.dead_letter_key(), raw.body)
                    .await;
                return;
            }
        };

        let Some(handler) = self.table.get(&envelope.name) else {
            warn!(
                channel = %self.channel,
                name = %envelope.name,
                "no handler registered for message"
            );
            self.dead_letters
                .push(&self.channel.dead_letter_key(), raw.body)
                .await;
            return;
        };

        debug!(channel = %self.channel, name = %envelope.name, "dispatching message");
        if let Err(e) = handler(envelope).await {
            error!(channel = %self.channel, error = %e, "handler failed");
            self.dead_letters
                .push(&self.channel.dead_letter_key(), raw.body)
                .await;
        }
    }
}

/// Handle to a running listener task.
pub struct ListenerHandle {
    channel: Channel,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal shutdown and join the task, waiting at most `timeout`.
    ///
    /// A task that fails to stop in time is aborted — the listener must
    /// never delay role shutdown indefinitely.
    pub async fn stop(self, timeout: Duration) {
        self.shutdown.notify_waiters();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => {
                info!(channel = %self.channel, "listener stopped");
            }
            Ok(Err(e)) => {
                warn!(channel = %self.channel, error = %e, "listener task panicked");
            }
            Err(_) => {
                warn!(channel = %self.channel, "listener stop timed out, aborting");
            }
        }
    }
}
