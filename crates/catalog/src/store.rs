//! Receiver-side catalog persistence seam.
//!
//! The real tables live behind a database repository; this trait carries
//! exactly the operations the result handlers need. All bulk inserts are
//! conflict-ignoring, which is what makes concurrent or re-delivered
//! chunk processing safe without locks.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use cardwatch_core::{CatalogRecord, SetData};

use crate::error::CatalogError;

/// (card name, set code, collector number) — the printing natural key.
pub type PrintingKey = (String, String, String);

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert card names, ignoring ones already present. Returns how many
    /// were new.
    async fn add_card_names(&self, names: &[String]) -> Result<usize, CatalogError>;

    /// Insert set rows, ignoring codes already present.
    async fn add_set_data(&self, sets: &[SetData]) -> Result<usize, CatalogError>;

    /// Insert finish strings, ignoring ones already present.
    async fn bulk_add_finishes(&self, finishes: &[String]) -> Result<usize, CatalogError>;

    /// Insert printings, ignoring duplicates by natural key. The records'
    /// finish lists are not stored here — associations are a second pass.
    async fn bulk_add_card_printings(
        &self,
        printings: &[CatalogRecord],
    ) -> Result<usize, CatalogError>;

    /// Natural key → surrogate id for every stored printing.
    async fn get_all_printings_map(&self) -> Result<HashMap<PrintingKey, i64>, CatalogError>;

    /// Finish string → surrogate id for every stored finish.
    async fn get_all_finishes_map(&self) -> Result<HashMap<String, i64>, CatalogError>;

    /// Insert printing↔finish association rows, ignoring duplicates.
    async fn bulk_add_printing_finish_associations(
        &self,
        associations: &[(i64, i64)],
    ) -> Result<usize, CatalogError>;
}

/// Apply one printings chunk to the catalog store.
///
/// Two passes, strictly ordered: the printing insert must land before
/// the association pass can resolve this chunk's (name, set, collector,
/// finish) tuples to surrogate ids. Finishes unknown to the store (their
/// finishes message may still be in flight) simply produce no
/// association — the next full ingestion run fills the gap.
pub async fn upsert_printings_chunk(
    store: &dyn CatalogStore,
    chunk: &[CatalogRecord],
) -> Result<(), CatalogError> {
    let inserted = store.bulk_add_card_printings(chunk).await?;
    debug!(
        chunk = chunk.len(),
        inserted, "printings chunk inserted (duplicates ignored)"
    );

    let printings_map = store.get_all_printings_map().await?;
    let finishes_map = store.get_all_finishes_map().await?;

    let mut associations = Vec::new();
    for record in chunk {
        let Some(&printing_id) = printings_map.get(&record.natural_key()) else {
            continue;
        };
        for finish in &record.finishes {
            if let Some(&finish_id) = finishes_map.get(finish) {
                associations.push((printing_id, finish_id));
            }
        }
    }

    if !associations.is_empty() {
        let added = store
            .bulk_add_printing_finish_associations(&associations)
            .await?;
        info!(
            candidates = associations.len(),
            added, "printing↔finish associations updated"
        );
    }
    Ok(())
}

// ── In-memory implementation ────────────────────────────────────────

#[derive(Default)]
struct MemoryTables {
    card_names: Vec<String>,
    sets: HashMap<String, SetData>,
    finishes: HashMap<String, i64>,
    printings: HashMap<PrintingKey, i64>,
    associations: Vec<(i64, i64)>,
    next_finish_id: i64,
    next_printing_id: i64,
}

/// In-memory [`CatalogStore`] for tests and single-process runs.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: Mutex<MemoryTables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn card_name_count(&self) -> usize {
        self.tables.lock().await.card_names.len()
    }

    pub async fn set_count(&self) -> usize {
        self.tables.lock().await.sets.len()
    }

    pub async fn printing_count(&self) -> usize {
        self.tables.lock().await.printings.len()
    }

    pub async fn association_count(&self) -> usize {
        self.tables.lock().await.associations.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn add_card_names(&self, names: &[String]) -> Result<usize, CatalogError> {
        let mut tables = self.tables.lock().await;
        let mut added = 0;
        for name in names {
            if !tables.card_names.contains(name) {
                tables.card_names.push(name.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn add_set_data(&self, sets: &[SetData]) -> Result<usize, CatalogError> {
        let mut tables = self.tables.lock().await;
        let mut added = 0;
        for set in sets {
            if !tables.sets.contains_key(&set.code) {
                tables.sets.insert(set.code.clone(), set.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn bulk_add_finishes(&self, finishes: &[String]) -> Result<usize, CatalogError> {
        let mut tables = self.tables.lock().await;
        let mut added = 0;
        for finish in finishes {
            if !tables.finishes.contains_key(finish) {
                tables.next_finish_id += 1;
                let id = tables.next_finish_id;
                tables.finishes.insert(finish.clone(), id);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn bulk_add_card_printings(
        &self,
        printings: &[CatalogRecord],
    ) -> Result<usize, CatalogError> {
        let mut tables = self.tables.lock().await;
        let mut added = 0;
        for record in printings {
            let key = record.natural_key();
            if !tables.printings.contains_key(&key) {
                tables.next_printing_id += 1;
                let id = tables.next_printing_id;
                tables.printings.insert(key, id);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn get_all_printings_map(&self) -> Result<HashMap<PrintingKey, i64>, CatalogError> {
        Ok(self.tables.lock().await.printings.clone())
    }

    async fn get_all_finishes_map(&self) -> Result<HashMap<String, i64>, CatalogError> {
        Ok(self.tables.lock().await.finishes.clone())
    }

    async fn bulk_add_printing_finish_associations(
        &self,
        associations: &[(i64, i64)],
    ) -> Result<usize, CatalogError> {
        let mut tables = self.tables.lock().await;
        let mut added = 0;
        for assoc in associations {
            if !tables.associations.contains(assoc) {
                tables.associations.push(*assoc);
                added += 1;
            }
        }
        Ok(added)
    }
}
