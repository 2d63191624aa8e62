//! Chunked catalog ingestion.
//!
//! Pulls the bulk feed as a stream, buckets printings into bounded
//! chunks, and publishes each chunk on the results channel for the
//! server's idempotent upsert. The chunk bound is a memory/message-size
//! bound, not a domain concept.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, warn};

use cardwatch_bus::messages::{names, CatalogFinishesChunkResult, CatalogPrintingsChunkResult};
use cardwatch_bus::{Channel, Envelope, EventPublisher};
use cardwatch_core::CatalogRecord;

use crate::error::CatalogError;
use crate::feed::{BulkCard, CardFeed};

/// Records per published chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 20_000;

/// What one ingestion run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records read off the stream.
    pub records: u64,
    /// Records dropped (malformed or missing essential fields).
    pub skipped: u64,
    /// Chunks successfully published.
    pub chunks_published: u32,
    /// Chunks whose publish failed and was skipped.
    pub chunks_failed: u32,
    /// Distinct finish strings seen across the whole feed.
    pub distinct_finishes: usize,
}

/// Streams the bulk feed into published catalog chunks.
pub struct CatalogIngestor {
    publisher: Arc<dyn EventPublisher>,
    chunk_size: usize,
}

impl CatalogIngestor {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run one full ingestion pass over the feed.
    ///
    /// Exactly `ceil(kept / chunk_size)` printing chunks are published —
    /// full chunks as the threshold is reached, plus the final partial
    /// chunk — and the distinct-finish set goes out once at the end. A
    /// single chunk's publish failure is logged, counted, and skipped;
    /// the stream continues, so a transient broker outage degrades
    /// completeness instead of aborting the run.
    pub async fn run(&self, feed: &dyn CardFeed) -> Result<IngestReport, CatalogError> {
        let mut stream = feed.bulk_stream().await?;

        let mut report = IngestReport::default();
        let mut chunk: Vec<CatalogRecord> = Vec::with_capacity(self.chunk_size);
        let mut finishes: BTreeSet<String> = BTreeSet::new();

        while let Some(item) = stream.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(e) => {
                    // The transport died mid-stream; keep what we have.
                    warn!(error = %e, "bulk stream failed mid-run, finishing with partial data");
                    break;
                }
            };
            report.records += 1;

            let card: BulkCard = match serde_json::from_slice(&raw) {
                Ok(card) => card,
                Err(e) => {
                    warn!(error = %e, "skipping malformed feed record");
                    report.skipped += 1;
                    continue;
                }
            };

            for finish in &card.finishes {
                finishes.insert(finish.clone());
            }

            let Some(record) = to_record(card) else {
                report.skipped += 1;
                continue;
            };
            chunk.push(record);

            if chunk.len() >= self.chunk_size {
                self.publish_chunk(&mut chunk, &mut report).await;
            }
        }

        // Final partial chunk.
        if !chunk.is_empty() {
            self.publish_chunk(&mut chunk, &mut report).await;
        }

        // The distinct-finish set goes out once, at the end.
        report.distinct_finishes = finishes.len();
        if !finishes.is_empty() {
            let payload = CatalogFinishesChunkResult {
                finishes: finishes.into_iter().collect(),
            };
            if let Err(e) = self.publish(names::CATALOG_FINISHES_CHUNK_RESULT, &payload).await {
                warn!(error = %e, "failed to publish finishes set");
            }
        }

        info!(
            records = report.records,
            skipped = report.skipped,
            chunks = report.chunks_published,
            failed_chunks = report.chunks_failed,
            finishes = report.distinct_finishes,
            "catalog ingestion finished"
        );
        Ok(report)
    }

    /// Publish the buffered chunk and reset the buffer. A failed publish
    /// drops this chunk only.
    async fn publish_chunk(&self, chunk: &mut Vec<CatalogRecord>, report: &mut IngestReport) {
        let printings = std::mem::take(chunk);
        let count = printings.len();
        let payload = CatalogPrintingsChunkResult { printings };

        match self.publish(names::CATALOG_PRINTINGS_CHUNK_RESULT, &payload).await {
            Ok(()) => {
                report.chunks_published += 1;
                info!(records = count, "published printings chunk");
            }
            Err(e) => {
                report.chunks_failed += 1;
                warn!(records = count, error = %e, "chunk publish failed, skipping chunk");
            }
        }
    }

    async fn publish<T: serde::Serialize>(
        &self,
        name: &str,
        payload: &T,
    ) -> Result<(), CatalogError> {
        let envelope = Envelope::new(name, payload)?;
        self.publisher
            .publish(Channel::WorkerResults, envelope)
            .await?;
        Ok(())
    }
}

/// A feed card becomes a catalog record only when every essential field
/// is present.
fn to_record(card: BulkCard) -> Option<CatalogRecord> {
    let name = card.name.filter(|s| !s.is_empty())?;
    let set_code = card.set_code.filter(|s| !s.is_empty())?;
    let collector_number = card.collector_number.filter(|s| !s.is_empty())?;
    if card.finishes.is_empty() {
        return None;
    }
    Some(CatalogRecord {
        card_name: name,
        set_code,
        collector_number,
        finishes: card.finishes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cardwatch_bus::BusError;
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Feed serving records from memory.
    struct MemoryFeed {
        records: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl CardFeed for MemoryFeed {
        async fn card_names(&self) -> Result<Vec<String>, CatalogError> {
            Ok(Vec::new())
        }

        async fn sets(&self) -> Result<Vec<cardwatch_core::SetData>, CatalogError> {
            Ok(Vec::new())
        }

        async fn bulk_stream(
            &self,
        ) -> Result<BoxStream<'static, Result<Vec<u8>, CatalogError>>, CatalogError> {
            let records: Vec<Result<Vec<u8>, CatalogError>> = self
                .records
                .iter()
                .map(|v| Ok(serde_json::to_vec(v).expect("test record")))
                .collect();
            Ok(futures::stream::iter(records).boxed())
        }
    }

    /// Publisher recording envelopes, optionally failing specific sends.
    struct RecordingPublisher {
        envelopes: Mutex<Vec<(Channel, Envelope)>>,
        fail_on_send: Option<u32>,
        sends: AtomicU32,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                envelopes: Mutex::new(Vec::new()),
                fail_on_send: None,
                sends: AtomicU32::new(0),
            }
        }

        fn failing_on(send_index: u32) -> Self {
            Self {
                fail_on_send: Some(send_index),
                ..Self::new()
            }
        }

        async fn published(&self) -> Vec<(Channel, Envelope)> {
            self.envelopes.lock().await.clone()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, channel: Channel, envelope: Envelope) -> Result<(), BusError> {
            let n = self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_send == Some(n) {
                return Err(BusError::Transport("broker briefly unreachable".into()));
            }
            self.envelopes.lock().await.push((channel, envelope));
            Ok(())
        }
    }

    fn card(name: &str, collector: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "set": "c21",
            "collector_number": collector,
            "finishes": ["nonfoil"]
        })
    }

    fn feed_of(n: usize) -> MemoryFeed {
        MemoryFeed {
            records: (0..n).map(|i| card("Sol Ring", &format!("{i}"))).collect(),
        }
    }

    #[tokio::test]
    async fn chunking_completeness() {
        // 45 records at chunk size 20 → ceil(45/20) = 3 chunks whose
        // concatenation is the original 45, in order, no dups.
        let publisher = Arc::new(RecordingPublisher::new());
        let ingestor = CatalogIngestor::new(publisher.clone()).with_chunk_size(20);

        let report = ingestor.run(&feed_of(45)).await.unwrap();
        assert_eq!(report.records, 45);
        assert_eq!(report.chunks_published, 3);
        assert_eq!(report.chunks_failed, 0);

        let published = publisher.published().await;
        let chunks: Vec<CatalogPrintingsChunkResult> = published
            .iter()
            .filter(|(_, env)| env.name == names::CATALOG_PRINTINGS_CHUNK_RESULT)
            .map(|(_, env)| env.decode().unwrap())
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].printings.len(), 20);
        assert_eq!(chunks[1].printings.len(), 20);
        assert_eq!(chunks[2].printings.len(), 5);

        let all: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.printings.iter().map(|p| p.collector_number.clone()))
            .collect();
        let expected: Vec<String> = (0..45).map(|i| i.to_string()).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn exact_multiple_produces_no_empty_trailing_chunk() {
        let publisher = Arc::new(RecordingPublisher::new());
        let ingestor = CatalogIngestor::new(publisher.clone()).with_chunk_size(10);

        let report = ingestor.run(&feed_of(20)).await.unwrap();
        assert_eq!(report.chunks_published, 2);
    }

    #[tokio::test]
    async fn finishes_published_once_at_end() {
        let publisher = Arc::new(RecordingPublisher::new());
        let ingestor = CatalogIngestor::new(publisher.clone()).with_chunk_size(2);

        let feed = MemoryFeed {
            records: vec![
                serde_json::json!({"name": "A", "set": "s", "collector_number": "1",
                                   "finishes": ["nonfoil", "foil"]}),
                serde_json::json!({"name": "B", "set": "s", "collector_number": "2",
                                   "finishes": ["foil", "etched"]}),
                serde_json::json!({"name": "C", "set": "s", "collector_number": "3",
                                   "finishes": ["nonfoil"]}),
            ],
        };
        let report = ingestor.run(&feed).await.unwrap();
        assert_eq!(report.distinct_finishes, 3);

        let published = publisher.published().await;
        let finish_messages: Vec<CatalogFinishesChunkResult> = published
            .iter()
            .filter(|(_, env)| env.name == names::CATALOG_FINISHES_CHUNK_RESULT)
            .map(|(_, env)| env.decode().unwrap())
            .collect();
        assert_eq!(finish_messages.len(), 1);
        assert_eq!(finish_messages[0].finishes, vec!["etched", "foil", "nonfoil"]);

        // And it is the last message of the run.
        assert_eq!(
            published.last().map(|(_, env)| env.name.as_str()),
            Some(names::CATALOG_FINISHES_CHUNK_RESULT)
        );
    }

    #[tokio::test]
    async fn failed_chunk_publish_is_skipped_and_stream_continues() {
        // Second publish (chunk index 1) fails; the run still completes
        // and later chunks go out.
        let publisher = Arc::new(RecordingPublisher::failing_on(1));
        let ingestor = CatalogIngestor::new(publisher.clone()).with_chunk_size(10);

        let report = ingestor.run(&feed_of(30)).await.unwrap();
        assert_eq!(report.chunks_published, 2);
        assert_eq!(report.chunks_failed, 1);

        let published = publisher.published().await;
        let chunk_count = published
            .iter()
            .filter(|(_, env)| env.name == names::CATALOG_PRINTINGS_CHUNK_RESULT)
            .count();
        assert_eq!(chunk_count, 2);
    }

    #[tokio::test]
    async fn records_missing_essential_fields_are_skipped() {
        let publisher = Arc::new(RecordingPublisher::new());
        let ingestor = CatalogIngestor::new(publisher.clone()).with_chunk_size(10);

        let feed = MemoryFeed {
            records: vec![
                card("Sol Ring", "263"),
                serde_json::json!({"name": "Digital Only Card", "set": "xyz",
                                   "collector_number": "1", "finishes": []}),
                serde_json::json!({"set": "xyz", "collector_number": "2",
                                   "finishes": ["nonfoil"]}),
            ],
        };
        let report = ingestor.run(&feed).await.unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.chunks_published, 1);
    }

    #[tokio::test]
    async fn empty_feed_publishes_nothing() {
        let publisher = Arc::new(RecordingPublisher::new());
        let ingestor = CatalogIngestor::new(publisher.clone());

        let report = ingestor.run(&feed_of(0)).await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert!(publisher.published().await.is_empty());
    }
}
