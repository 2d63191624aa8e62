//! External card feed client.
//!
//! The bulk endpoint is a single JSON array of every printing — far too
//! large to hold in memory, so [`CardFeed::bulk_stream`] exposes it as a
//! lazy stream of raw per-record bytes, restartable per run. Decoding a
//! record is left to the consumer so one malformed row can be skipped
//! without aborting its siblings.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use cardwatch_core::SetData;

use crate::error::CatalogError;
use crate::json_stream::JsonArrayDecoder;

/// One card object from the bulk feed — only the fields this system reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkCard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "set", default)]
    pub set_code: Option<String>,
    #[serde(default)]
    pub collector_number: Option<String>,
    #[serde(default)]
    pub finishes: Vec<String>,
}

/// The external card catalog feed.
#[async_trait]
pub trait CardFeed: Send + Sync {
    /// All unique card names.
    async fn card_names(&self) -> Result<Vec<String>, CatalogError>;

    /// All card sets.
    async fn sets(&self) -> Result<Vec<SetData>, CatalogError>;

    /// Open the bulk printings feed as a lazy stream of raw JSON records.
    ///
    /// Each call re-opens the feed from the start.
    async fn bulk_stream(&self)
        -> Result<BoxStream<'static, Result<Vec<u8>, CatalogError>>, CatalogError>;
}

// ── Scryfall wire shapes ────────────────────────────────────────────

#[derive(Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: Vec<String>,
}

#[derive(Deserialize)]
struct SetsResponse {
    #[serde(default)]
    data: Vec<RawSet>,
}

#[derive(Deserialize)]
struct RawSet {
    code: Option<String>,
    name: Option<String>,
    released_at: Option<String>,
}

#[derive(Deserialize)]
struct BulkDataResponse {
    #[serde(default)]
    data: Vec<BulkDataFile>,
}

#[derive(Deserialize)]
struct BulkDataFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    download_uri: Option<String>,
}

/// Rows missing the essential fields are dropped; an unparseable release
/// date degrades to `None`.
fn convert_sets(raw: Vec<RawSet>) -> Vec<SetData> {
    raw.into_iter()
        .filter_map(|raw| {
            let (code, name) = (raw.code?, raw.name?);
            let release_date = raw
                .released_at
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            Some(SetData {
                code,
                name,
                release_date,
            })
        })
        .collect()
}

/// Scryfall-backed [`CardFeed`].
pub struct ScryfallFeed {
    client: reqwest::Client,
    base_url: String,
}

impl ScryfallFeed {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.scryfall.com";

    pub fn new() -> Result<Self, CatalogError> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cardwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Resolve the bulk "default cards" download URI from the feed's
    /// bulk-data catalog.
    async fn default_cards_uri(&self) -> Result<String, CatalogError> {
        let url = format!("{}/bulk-data", self.base_url);
        let response: BulkDataResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .data
            .into_iter()
            .find(|f| f.kind.as_deref() == Some("default_cards"))
            .and_then(|f| f.download_uri)
            .ok_or_else(|| {
                CatalogError::Feed("no default_cards entry in bulk data catalog".into())
            })
    }
}

#[async_trait]
impl CardFeed for ScryfallFeed {
    async fn card_names(&self) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/catalog/card-names", self.base_url);
        let response: CatalogResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(names = response.data.len(), "fetched card name catalog");
        Ok(response.data)
    }

    async fn sets(&self) -> Result<Vec<SetData>, CatalogError> {
        let url = format!("{}/sets", self.base_url);
        let response: SetsResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let sets = convert_sets(response.data);
        info!(sets = sets.len(), "fetched set catalog");
        Ok(sets)
    }

    async fn bulk_stream(
        &self,
    ) -> Result<BoxStream<'static, Result<Vec<u8>, CatalogError>>, CatalogError> {
        let uri = self.default_cards_uri().await?;
        info!(uri = %uri, "opening bulk card data stream");

        let response = self.client.get(&uri).send().await?.error_for_status()?;
        let bytes = response.bytes_stream().boxed();

        let stream = futures::stream::try_unfold(
            (bytes, JsonArrayDecoder::new()),
            |(mut bytes, mut decoder)| async move {
                loop {
                    if let Some(record) = decoder.pop_object()? {
                        return Ok(Some((record, (bytes, decoder))));
                    }
                    if decoder.finished() {
                        return Ok(None);
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => decoder.feed(&chunk),
                        Some(Err(e)) => return Err(CatalogError::Transport(e)),
                        None => {
                            if !decoder.finished() {
                                warn!("bulk stream ended before the array closed");
                            }
                            return Ok(None);
                        }
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_card_tolerates_missing_fields() {
        let card: BulkCard = serde_json::from_str(r#"{"name": "Sol Ring"}"#).unwrap();
        assert_eq!(card.name.as_deref(), Some("Sol Ring"));
        assert!(card.set_code.is_none());
        assert!(card.finishes.is_empty());
    }

    #[test]
    fn bulk_card_reads_set_alias() {
        let card: BulkCard = serde_json::from_str(
            r#"{"name": "Sol Ring", "set": "c21", "collector_number": "263",
                "finishes": ["nonfoil", "etched"]}"#,
        )
        .unwrap();
        assert_eq!(card.set_code.as_deref(), Some("c21"));
        assert_eq!(card.finishes, vec!["nonfoil", "etched"]);
    }

    #[test]
    fn set_conversion_drops_incomplete_rows() {
        let raw: SetsResponse = serde_json::from_str(
            r#"{"data": [
                {"code": "mh2", "name": "Modern Horizons 2", "released_at": "2021-06-18"},
                {"code": null, "name": "Broken Set"},
                {"code": "xyz", "name": "No Date Set", "released_at": "not-a-date"}
            ]}"#,
        )
        .unwrap();

        let sets = convert_sets(raw.data);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].release_date, NaiveDate::from_ymd_opt(2021, 6, 18));
        assert_eq!(sets[1].release_date, None);
    }
}
