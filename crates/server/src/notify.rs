use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use cardwatch_core::diff::ListingDelta;
use cardwatch_core::{Listing, StoreListings};

/// The per-card change summary pushed to one user.
///
/// Only the sections that actually changed are populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardChangeSummary {
    pub card_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<StoreListings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<StoreListings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<BTreeMap<String, ListingDelta>>,
}

/// Push-notification seam toward the UI layer.
///
/// Rendering and session handling live outside this core; the server
/// role only ever talks to this trait. Delivery is best-effort — these
/// are push notifications, durability rides on the job queue.
#[async_trait]
pub trait ClientNotifier: Send + Sync {
    /// A card a user tracks changed availability.
    async fn availability_changed(&self, username: &str, summary: &CardChangeSummary);

    /// One (store, card) cell was refreshed.
    async fn card_availability_data(&self, store: &str, card: &str, items: &[Listing]);

    /// A worker was shut down mid-check; the job will be retried.
    async fn job_interrupted(&self, username: &str, card: &str, message: &str);
}

/// Notifier that just logs. Stands in when no UI transport is attached.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ClientNotifier for LogNotifier {
    async fn availability_changed(&self, username: &str, summary: &CardChangeSummary) {
        info!(
            user = username,
            card = %summary.card_name,
            added = summary.added.is_some(),
            removed = summary.removed.is_some(),
            updated = summary.updated.is_some(),
            "availability changed"
        );
    }

    async fn card_availability_data(&self, store: &str, card: &str, items: &[Listing]) {
        info!(store, card, items = items.len(), "card availability data");
    }

    async fn job_interrupted(&self, username: &str, card: &str, message: &str) {
        info!(user = username, card, message, "job interrupted");
    }
}
