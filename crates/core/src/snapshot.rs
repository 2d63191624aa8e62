use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::Listing;

/// Context name for the shared, non-user-scoped availability snapshot.
pub const SYSTEM_CONTEXT: &str = "system";

/// Ordered listings per store slug.
pub type StoreListings = BTreeMap<String, Vec<Listing>>;

/// Complete point-in-time availability state for one context.
///
/// A context is either a username or [`SYSTEM_CONTEXT`]. Snapshots are
/// replaced wholesale on each refresh cycle and never mutated after
/// capture — the previous snapshot is the `old` input to
/// [`detect_changes`](crate::diff::detect_changes), then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    /// card name → store slug → listings.
    pub cards: BTreeMap<String, StoreListings>,
    /// When this snapshot was captured.
    pub captured_at: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    /// An empty snapshot stamped now.
    pub fn empty() -> Self {
        Self {
            cards: BTreeMap::new(),
            captured_at: Utc::now(),
        }
    }

    /// Record the listings for one (card, store) cell, replacing any
    /// previous contents of that cell.
    pub fn insert(
        &mut self,
        card_name: impl Into<String>,
        store_id: impl Into<String>,
        listings: Vec<Listing>,
    ) {
        self.cards
            .entry(card_name.into())
            .or_default()
            .insert(store_id.into(), listings);
    }

    /// Listings for one (card, store) cell, if present.
    pub fn get(&self, card_name: &str, store_id: &str) -> Option<&[Listing]> {
        self.cards
            .get(card_name)
            .and_then(|stores| stores.get(store_id))
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for AvailabilitySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
