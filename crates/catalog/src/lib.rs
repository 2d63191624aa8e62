pub mod error;
pub mod feed;
pub mod ingest;
pub mod json_stream;
pub mod store;

pub use error::CatalogError;
pub use feed::{BulkCard, CardFeed, ScryfallFeed};
pub use ingest::{CatalogIngestor, IngestReport, DEFAULT_CHUNK_SIZE};
pub use json_stream::JsonArrayDecoder;
pub use store::{upsert_printings_chunk, CatalogStore, MemoryCatalog};
