use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One in-stock card offer at a specific retailer.
///
/// `set_code` and `collector_number` come from the product detail page and
/// may be absent when that page could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Slug of the store this offer was scraped from.
    pub store_id: String,
    /// Canonical card name as printed on the product row.
    pub card_name: String,
    /// Set code, uppercase (e.g. "MH2"). None when the detail page failed.
    pub set_code: Option<String>,
    /// Collector number within the set. None when the detail page failed.
    pub collector_number: Option<String>,
    /// Finish of this variant (e.g. "foil", "non-foil").
    pub finish: String,
    /// Asking price.
    pub price: Decimal,
    /// Units in stock for this variant.
    pub stock_count: u32,
    /// Condition grade (e.g. "NM-Mint", "Lightly Played").
    pub condition: String,
    /// Product page URL. Not part of the listing identity.
    pub url: String,
}

/// Identity key for a [`Listing`].
///
/// Two listings with equal identity are the same offer. The URL and the
/// stock count are not part of the identity, so rows differing only in
/// those fields collapse to one listing during dedup and diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingIdentity {
    pub store_id: String,
    pub card_name: String,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub finish: String,
    pub price: Decimal,
    pub condition: String,
}

impl Listing {
    /// Uppercase the set code in place. Scrapers call this once per row so
    /// identity comparison never depends on source-page casing.
    pub fn normalize(mut self) -> Self {
        self.set_code = self.set_code.map(|s| s.to_uppercase());
        self
    }

    /// The identity key of this listing (see [`ListingIdentity`]).
    pub fn identity(&self) -> ListingIdentity {
        ListingIdentity {
            store_id: self.store_id.clone(),
            card_name: self.card_name.clone(),
            set_code: self.set_code.as_ref().map(|s| s.to_uppercase()),
            collector_number: self.collector_number.clone(),
            finish: self.finish.to_lowercase(),
            price: self.price,
            condition: self.condition.clone(),
        }
    }
}

/// Parse a scraped price string like `"$1,234.56"` into a [`Decimal`].
pub fn parse_price(raw: &str) -> Result<Decimal, CoreError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned
        .parse::<Decimal>()
        .map_err(|e| CoreError::PriceParse(format!("{raw:?}: {e}")))
}
