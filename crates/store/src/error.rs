use thiserror::Error;

/// Failure modes while fetching and parsing storefront pages.
///
/// All of these are contained inside the scraping layer: callers of
/// [`Storefront::scrape_listings`](crate::Storefront::scrape_listings)
/// only ever see a (possibly empty) listing vector.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {0}")]
    Status(u16),

    /// Rate limiting detected via the 200-status body heuristic.
    #[error("rate limited by storefront")]
    RateLimited,

    #[error("parse failure: {0}")]
    Parse(String),
}
