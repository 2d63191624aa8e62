use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cardwatch_core::{Listing, TrackedCard};

use crate::client::HttpFetcher;
use crate::crystal::CrystalCommerceStorefront;
use crate::filtering::filter_listings;
use crate::null::NullStorefront;
use crate::sets::SetCodeLookup;

/// Static description of one store, as persisted by the collaborating
/// store table. `fetch_strategy` names the page-template family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub name: String,
    pub slug: String,
    pub homepage: String,
    pub search_url: String,
    pub fetch_strategy: String,
}

/// One storefront scraper. Implemented per page-template family, not per
/// store — every Crystal Commerce shop shares one implementation.
///
/// `scrape_listings` is infallible by contract: any failure inside is
/// logged and degraded, and an empty vector is a valid "out of stock"
/// answer.
#[async_trait]
pub trait Storefront: Send + Sync {
    fn profile(&self) -> &StoreProfile;

    /// Fetch and normalize this store's listings for a card name.
    async fn scrape_listings(&self, card_name: &str) -> Vec<Listing>;
}

/// Explicitly constructed registry of storefront scrapers, keyed by slug.
///
/// Built once at role startup from store profiles and passed into the
/// worker tasks — roles stay independently testable because nothing here
/// is global.
pub struct StoreRegistry {
    stores: HashMap<String, Arc<dyn Storefront>>,
}

impl StoreRegistry {
    /// Instantiate one scraper per profile, keyed by the template-family
    /// strategy. Unrecognized strategies fall back to the null scraper
    /// with a logged warning.
    pub fn from_profiles(
        profiles: Vec<StoreProfile>,
        fetcher: Arc<HttpFetcher>,
        sets: Arc<SetCodeLookup>,
    ) -> Self {
        let mut stores: HashMap<String, Arc<dyn Storefront>> = HashMap::new();
        for profile in profiles {
            let slug = profile.slug.clone();
            let store: Arc<dyn Storefront> = match profile.fetch_strategy.as_str() {
                "crystal_commerce" => Arc::new(CrystalCommerceStorefront::new(
                    profile,
                    fetcher.clone(),
                    sets.clone(),
                )),
                other => {
                    warn!(
                        store = %slug,
                        fetch_strategy = other,
                        "no scraping strategy for template family, using null storefront"
                    );
                    Arc::new(NullStorefront::new(profile))
                }
            };
            stores.insert(slug, store);
        }
        info!(stores = stores.len(), "store registry built");
        Self { stores }
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn Storefront>> {
        self.stores.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Scrape one store for one tracked card and filter against the
    /// card's specifications.
    ///
    /// An unknown slug, a dead storefront, or a card that simply isn't
    /// stocked all produce the same empty vector.
    pub async fn check_availability(&self, slug: &str, card: &TrackedCard) -> Vec<Listing> {
        let Some(store) = self.get(slug) else {
            warn!(store = slug, "store is not configured");
            return Vec::new();
        };

        info!(store = slug, card = %card.card_name, "checking availability");
        let raw = store.scrape_listings(&card.card_name).await;
        filter_listings(&card.card_name, raw, &card.specifications)
    }
}
