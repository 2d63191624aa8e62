use async_trait::async_trait;
use tracing::info;

use cardwatch_core::Listing;

use crate::storefront::{StoreProfile, Storefront};

/// Fallback for stores whose template family has no scraping strategy.
///
/// Always returns an empty result, so an unrecognized store degrades to
/// "never in stock" instead of failing requests that mention it.
pub struct NullStorefront {
    profile: StoreProfile,
}

impl NullStorefront {
    pub fn new(profile: StoreProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Storefront for NullStorefront {
    fn profile(&self) -> &StoreProfile {
        &self.profile
    }

    async fn scrape_listings(&self, card_name: &str) -> Vec<Listing> {
        info!(
            store = %self.profile.slug,
            card_name,
            "null storefront queried, returning no listings"
        );
        Vec::new()
    }
}
