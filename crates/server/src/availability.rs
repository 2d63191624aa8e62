//! Server-side availability state: cache writes, snapshot refresh, diff,
//! and the per-user notification fan-out.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use cardwatch_core::{detect_changes, AvailabilitySnapshot, ChangeSet, Listing, SYSTEM_CONTEXT};
use cardwatch_store::{AvailabilityCache, SnapshotStore, UserDirectory};

use crate::notify::{CardChangeSummary, ClientNotifier};

/// Consumes refreshed (store, card) cells: writes the short-TTL cache,
/// refreshes the shared snapshot, and notifies every user tracking a
/// changed card.
pub struct AvailabilityTracker {
    cache: Arc<AvailabilityCache>,
    snapshots: Arc<SnapshotStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn ClientNotifier>,
}

impl AvailabilityTracker {
    pub fn new(
        cache: Arc<AvailabilityCache>,
        snapshots: Arc<SnapshotStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn ClientNotifier>,
    ) -> Self {
        Self {
            cache,
            snapshots,
            users,
            notifier,
        }
    }

    /// Apply one refreshed (store, card) cell.
    ///
    /// The previous snapshot becomes the `old` diff input, the refreshed
    /// one replaces it wholesale, and the change set is consumed once by
    /// the notification fan-out.
    pub async fn apply_result(&self, store: &str, card: &str, items: Vec<Listing>) {
        self.cache.set(store, card, items.clone()).await;
        self.notifier.card_availability_data(store, card, &items).await;

        let old = self
            .snapshots
            .load(SYSTEM_CONTEXT)
            .await
            .unwrap_or_else(AvailabilitySnapshot::empty);
        let new = next_snapshot(&old, store, card, items);

        let changes = detect_changes(&old, &new);
        self.snapshots.save(SYSTEM_CONTEXT, new).await;

        if changes.is_empty() {
            debug!(store, card, "no availability change");
            return;
        }
        self.notify_users_of_changes(&changes).await;
    }

    /// Fan `availability_changed` out to every user tracking a changed
    /// card.
    async fn notify_users_of_changes(&self, changes: &ChangeSet) {
        let changed_cards = changes.changed_cards();
        info!(cards = changed_cards.len(), "processing availability notifications");

        let tracking = self
            .users
            .get_tracking_users_for_cards(&changed_cards)
            .await;

        for card_name in changed_cards {
            let Some(usernames) = tracking.get(&card_name) else {
                debug!(card = %card_name, "no users track this card");
                continue;
            };

            let summary = CardChangeSummary {
                card_name: card_name.clone(),
                added: changes.added.get(&card_name).cloned(),
                removed: changes.removed.get(&card_name).cloned(),
                updated: changes.updated.get(&card_name).cloned(),
            };

            for username in usernames {
                info!(user = %username, card = %card_name, "notifying of availability change");
                self.notifier.availability_changed(username, &summary).await;
            }
        }
    }
}

/// The successor snapshot: the old one with a single (card, store) cell
/// replaced and a fresh capture time. An empty result for a cell that
/// did not exist stays absent — a card that was never seen in stock is
/// not "added with nothing".
fn next_snapshot(
    old: &AvailabilitySnapshot,
    store: &str,
    card: &str,
    items: Vec<Listing>,
) -> AvailabilitySnapshot {
    let mut next = old.clone();
    next.captured_at = Utc::now();

    if items.is_empty() && old.get(card, store).is_none() {
        return next;
    }

    next.insert(card, store, items);
    next
}
