use tracing::debug;

use cardwatch_core::{CardSpecification, Listing};

/// Post-fetch filtering of scraped listings against the caller's
/// specifications.
///
/// The card name must match case-insensitively. With no specifications a
/// name match is sufficient; otherwise a listing is kept when it matches
/// ANY of the provided specifications (each specification's unpopulated
/// fields are wildcards — see [`CardSpecification::matches`]).
pub fn filter_listings(
    card_name: &str,
    listings: Vec<Listing>,
    specifications: &[CardSpecification],
) -> Vec<Listing> {
    let total = listings.len();
    let filtered: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| {
            if !card_name.eq_ignore_ascii_case(&listing.card_name) {
                return false;
            }
            specifications.is_empty() || specifications.iter().any(|spec| spec.matches(listing))
        })
        .collect();

    debug!(
        card_name,
        raw = total,
        matching = filtered.len(),
        "filtered listings"
    );
    filtered
}
