use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use cardwatch_core::{AvailabilitySnapshot, Listing};

/// Availability results are fresh for 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(1800);

struct CacheEntry {
    listings: Vec<Listing>,
    expires_at: Instant,
}

/// Short-TTL read-through cache of scraped availability, keyed by
/// `availability:<store_slug>:<card_name>`.
///
/// A miss and an expired entry are indistinguishable, and there is no
/// partial invalidation. Writes are last-writer-wins — entries are
/// idempotent re-derivations of upstream fact, so racing writers are
/// harmless.
#[derive(Default)]
pub struct AvailabilityCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

fn cache_key(store_slug: &str, card_name: &str) -> String {
    format!("availability:{store_slug}:{card_name}")
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listings for one (store, card), or `None` on miss/expiry.
    pub async fn get(&self, store_slug: &str, card_name: &str) -> Option<Vec<Listing>> {
        let key = cache_key(store_slug, card_name);
        let mut entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.listings.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store listings for one (store, card) with the default TTL.
    pub async fn set(&self, store_slug: &str, card_name: &str, listings: Vec<Listing>) {
        self.set_with_ttl(store_slug, card_name, listings, DEFAULT_TTL)
            .await;
    }

    pub async fn set_with_ttl(
        &self,
        store_slug: &str,
        card_name: &str,
        listings: Vec<Listing>,
        ttl: Duration,
    ) {
        let key = cache_key(store_slug, card_name);
        debug!(key = %key, listings = listings.len(), ttl_secs = ttl.as_secs(), "caching availability");
        self.entries.lock().await.insert(
            key,
            CacheEntry {
                listings,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Per-context full availability snapshots, stored under
/// `<context>_availability` with no TTL.
///
/// A context is a username or the shared
/// [`SYSTEM_CONTEXT`](cardwatch_core::SYSTEM_CONTEXT). Snapshots are
/// replaced wholesale each refresh cycle.
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: Mutex<HashMap<String, AvailabilitySnapshot>>,
}

fn snapshot_key(context: &str) -> String {
    format!("{context}_availability")
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, context: &str) -> Option<AvailabilitySnapshot> {
        self.snapshots.lock().await.get(&snapshot_key(context)).cloned()
    }

    /// Replace the context's snapshot wholesale.
    pub async fn save(&self, context: &str, snapshot: AvailabilitySnapshot) {
        self.snapshots
            .lock()
            .await
            .insert(snapshot_key(context), snapshot);
    }
}
