use thiserror::Error;

/// Errors from the catalog feed and ingestion pipeline.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("malformed feed data: {0}")]
    Parse(String),

    #[error("encode/decode error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("bus error: {0}")]
    Bus(#[from] cardwatch_bus::BusError),
}
