use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

/// Destination for raw message bodies that failed processing.
///
/// One logical list per key (e.g. `scheduler-requests-dlq`). Pushing never
/// fails from the listener's perspective — a sink that cannot store a
/// message logs and drops it, because dead-lettering must not take the
/// listener down with it.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Append a raw message body to the named list.
    async fn push(&self, key: &str, raw: Vec<u8>);

    /// Remove and return the named list's contents.
    async fn drain(&self, key: &str) -> Vec<Vec<u8>>;

    /// Number of messages currently in the named list.
    async fn depth(&self, key: &str) -> usize;
}

/// In-process dead-letter store.
///
/// Holds raw bodies per key until drained. Suitable for single-process
/// deployments and tests; a durable implementation can be injected in its
/// place without touching the listener.
#[derive(Default)]
pub struct MemoryDeadLetter {
    lists: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl MemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn push(&self, key: &str, raw: Vec<u8>) {
        warn!(key, bytes = raw.len(), "dead-lettering message");
        self.lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push(raw);
    }

    async fn drain(&self, key: &str) -> Vec<Vec<u8>> {
        self.lists.lock().await.remove(key).unwrap_or_default()
    }

    async fn depth(&self, key: &str) -> usize {
        self.lists.lock().await.get(key).map_or(0, Vec::len)
    }
}
