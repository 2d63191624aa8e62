//! Pure diff engine over two availability snapshots.
//!
//! [`detect_changes`] is side-effect free and idempotent: diffing a
//! snapshot against itself yields an empty [`ChangeSet`].

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::listing::Listing;
use crate::snapshot::{AvailabilitySnapshot, StoreListings};

/// Per-store listing delta for a card that persisted across snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDelta {
    /// Listings present only in the new snapshot.
    #[serde(rename = "new")]
    pub new_listings: Vec<Listing>,
    /// Listings present only in the old snapshot.
    pub removed: Vec<Listing>,
}

/// Structured diff between two availability snapshots.
///
/// Derived and transient: consumed once by the notification fan-out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Cards absent from the old snapshot, with their full new content.
    pub added: BTreeMap<String, StoreListings>,
    /// Cards absent from the new snapshot, with their full old content.
    pub removed: BTreeMap<String, StoreListings>,
    /// card → store → delta, for cards present in both snapshots.
    pub updated: BTreeMap<String, BTreeMap<String, ListingDelta>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    /// Names of all cards touched by this change set.
    pub fn changed_cards(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .added
            .keys()
            .chain(self.removed.keys())
            .chain(self.updated.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Compare two snapshots and report added, removed, and updated cards.
///
/// Comparison is identity-based (see
/// [`ListingIdentity`](crate::listing::ListingIdentity)): rows differing
/// only by URL or stock count are the same offer. A store that disappears
/// from a card that itself persists produces no entry — only stores
/// present in the new snapshot's cell are examined. Inputs are never
/// mutated.
pub fn detect_changes(old: &AvailabilitySnapshot, new: &AvailabilitySnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    // Cards gone entirely.
    for (card, stores) in &old.cards {
        if !new.cards.contains_key(card) {
            changes.removed.insert(card.clone(), stores.clone());
        }
    }

    for (card, new_stores) in &new.cards {
        let Some(old_stores) = old.cards.get(card) else {
            // Card is entirely new.
            changes.added.insert(card.clone(), new_stores.clone());
            continue;
        };

        for (store, new_listings) in new_stores {
            let old_listings = old_stores.get(store).map(Vec::as_slice).unwrap_or(&[]);

            let old_ids: HashSet<_> = old_listings.iter().map(Listing::identity).collect();
            let new_ids: HashSet<_> = new_listings.iter().map(Listing::identity).collect();
            if old_ids == new_ids {
                continue;
            }

            let delta = ListingDelta {
                new_listings: new_listings
                    .iter()
                    .filter(|l| !old_ids.contains(&l.identity()))
                    .cloned()
                    .collect(),
                removed: old_listings
                    .iter()
                    .filter(|l| !new_ids.contains(&l.identity()))
                    .cloned()
                    .collect(),
            };
            changes
                .updated
                .entry(card.clone())
                .or_default()
                .insert(store.clone(), delta);
        }
    }

    debug!(
        added = changes.added.len(),
        removed = changes.removed.len(),
        updated = changes.updated.len(),
        "availability diff computed"
    );
    changes
}
