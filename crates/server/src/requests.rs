//! Request origination: the server/API side of the request channel.
//!
//! These calls never block on scraping — they answer from the short-TTL
//! cache and publish commands for the scheduler to turn into jobs.
//! Publishing is best-effort; durability of the eventual fan-out rides
//! on the job queue, not on this process.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use cardwatch_bus::messages::{names, AvailabilityRequest, QueueAllAvailabilityChecks};
use cardwatch_bus::{Channel, Envelope, EventPublisher};
use cardwatch_core::{Listing, TrackedCard};
use cardwatch_store::{AvailabilityCache, UserDirectory};

/// store slug → card name → cached listings.
pub type CachedAvailability = BTreeMap<String, BTreeMap<String, Vec<Listing>>>;

pub struct AvailabilityService {
    cache: Arc<AvailabilityCache>,
    users: Arc<dyn UserDirectory>,
    publisher: Arc<dyn EventPublisher>,
}

impl AvailabilityService {
    pub fn new(
        cache: Arc<AvailabilityCache>,
        users: Arc<dyn UserDirectory>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            cache,
            users,
            publisher,
        }
    }

    /// Manual refresh of a user's whole card list: one command, the
    /// scheduler does the fan-out.
    pub async fn request_full_refresh(&self, username: &str) {
        info!(user = username, "manual availability refresh requested");
        let payload = QueueAllAvailabilityChecks {
            username: username.to_string(),
        };
        self.publish(names::QUEUE_ALL_AVAILABILITY_CHECKS, &payload)
            .await;
    }

    /// Force a check of one card against every preferred store of the
    /// user.
    pub async fn request_card_check(&self, username: &str, card: &TrackedCard) {
        let stores = self.users.get_user_stores(username).await;
        if stores.is_empty() {
            warn!(user = username, "user has no preferred stores, skipping check");
            return;
        }

        for store_slug in stores {
            let payload = AvailabilityRequest {
                user: username.to_string(),
                store_slug,
                card_data: card.clone(),
            };
            self.publish(names::AVAILABILITY_REQUEST, &payload).await;
        }
    }

    /// Read-through: return whatever the cache holds for the user's
    /// tracked (store, card) pairs, and publish a check request for each
    /// miss. Misses and expired entries look identical and both trigger
    /// a request.
    pub async fn cached_or_request(&self, username: &str) -> CachedAvailability {
        let stores = self.users.get_user_stores(username).await;
        let cards = self.users.load_card_list(username).await;

        if stores.is_empty() {
            warn!(user = username, "user has no preferred stores, nothing to check");
            return CachedAvailability::new();
        }

        let mut cached = CachedAvailability::new();
        for card in &cards {
            for store_slug in &stores {
                match self.cache.get(store_slug, &card.card_name).await {
                    Some(listings) => {
                        debug!(store = %store_slug, card = %card.card_name, "cache hit");
                        cached
                            .entry(store_slug.clone())
                            .or_default()
                            .insert(card.card_name.clone(), listings);
                    }
                    None => {
                        info!(store = %store_slug, card = %card.card_name, "cache miss, requesting check");
                        let payload = AvailabilityRequest {
                            user: username.to_string(),
                            store_slug: store_slug.clone(),
                            card_data: card.clone(),
                        };
                        self.publish(names::AVAILABILITY_REQUEST, &payload).await;
                    }
                }
            }
        }
        cached
    }

    async fn publish<T: Serialize>(&self, name: &str, payload: &T) {
        let envelope = match Envelope::new(name, payload) {
            Ok(env) => env,
            Err(e) => {
                warn!(name, error = %e, "failed to encode request payload");
                return;
            }
        };
        if let Err(e) = self
            .publisher
            .publish(Channel::SchedulerRequests, envelope)
            .await
        {
            warn!(name, error = %e, "failed to publish request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cardwatch_bus::BusError;
    use cardwatch_store::MemoryUserDirectory;
    use tokio::sync::Mutex;

    struct RecordingPublisher {
        envelopes: Mutex<Vec<(Channel, Envelope)>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                envelopes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, channel: Channel, envelope: Envelope) -> Result<(), BusError> {
            self.envelopes.lock().await.push((channel, envelope));
            Ok(())
        }
    }

    fn listing() -> Listing {
        Listing {
            store_id: "authority_games".into(),
            card_name: "Sol Ring".into(),
            set_code: Some("C21".into()),
            collector_number: Some("263".into()),
            finish: "non-foil".into(),
            price: "1.99".parse().unwrap(),
            stock_count: 3,
            condition: "NM-Mint".into(),
            url: String::new(),
        }
    }

    async fn service() -> (AvailabilityService, Arc<RecordingPublisher>, Arc<AvailabilityCache>) {
        let users = Arc::new(MemoryUserDirectory::new());
        users
            .add_user(
                "kara",
                vec!["authority_games".into()],
                vec![
                    TrackedCard::any_printing("Sol Ring"),
                    TrackedCard::any_printing("Brainstorm"),
                ],
            )
            .await;
        let publisher = Arc::new(RecordingPublisher::new());
        let cache = Arc::new(AvailabilityCache::new());
        (
            AvailabilityService::new(cache.clone(), users, publisher.clone()),
            publisher,
            cache,
        )
    }

    #[tokio::test]
    async fn full_refresh_publishes_one_command() {
        let (service, publisher, _cache) = service().await;
        service.request_full_refresh("kara").await;

        let published = publisher.envelopes.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, Channel::SchedulerRequests);
        assert_eq!(published[0].1.name, names::QUEUE_ALL_AVAILABILITY_CHECKS);
    }

    #[tokio::test]
    async fn card_check_publishes_per_preferred_store() {
        let (service, publisher, _cache) = service().await;
        service
            .request_card_check("kara", &TrackedCard::any_printing("Sol Ring"))
            .await;

        let published = publisher.envelopes.lock().await;
        assert_eq!(published.len(), 1);
        let request: AvailabilityRequest = published[0].1.decode().unwrap();
        assert_eq!(request.store_slug, "authority_games");
    }

    #[tokio::test]
    async fn cached_cells_are_returned_misses_are_requested() {
        let (service, publisher, cache) = service().await;
        cache
            .set("authority_games", "Sol Ring", vec![listing()])
            .await;

        let cached = service.cached_or_request("kara").await;

        // Sol Ring comes from the cache...
        assert_eq!(cached["authority_games"]["Sol Ring"], vec![listing()]);
        assert!(!cached["authority_games"].contains_key("Brainstorm"));

        // ...and Brainstorm's miss turned into a request.
        let published = publisher.envelopes.lock().await;
        assert_eq!(published.len(), 1);
        let request: AvailabilityRequest = published[0].1.decode().unwrap();
        assert_eq!(request.card_data.card_name, "Brainstorm");
    }

    #[tokio::test]
    async fn user_without_stores_gets_empty_and_no_requests() {
        let (service, publisher, _cache) = service().await;
        let cached = service.cached_or_request("stranger").await;
        assert!(cached.is_empty());
        assert!(publisher.envelopes.lock().await.is_empty());
    }
}
