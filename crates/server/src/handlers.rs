//! `worker-results` handler table.
//!
//! Each handler decodes its typed payload and applies it; a decode
//! failure or handler error surfaces as `Err`, which the listener turns
//! into a dead-lettered message while the loop continues.

use std::sync::Arc;

use tracing::info;

use cardwatch_bus::messages::{
    names, AvailabilityResult, CatalogCardNamesResult, CatalogFinishesChunkResult,
    CatalogPrintingsChunkResult, CatalogSetDataResult, JobInterrupted,
};
use cardwatch_bus::{BusError, HandlerTable};
use cardwatch_catalog::{upsert_printings_chunk, CatalogStore};

use crate::availability::AvailabilityTracker;
use crate::notify::ClientNotifier;

/// Dependencies for the result handlers.
pub struct ServerContext {
    pub tracker: Arc<AvailabilityTracker>,
    pub catalog: Arc<dyn CatalogStore>,
    pub notifier: Arc<dyn ClientNotifier>,
}

/// Build the `worker-results` handler table.
pub fn result_handlers(ctx: Arc<ServerContext>) -> HandlerTable {
    let table = HandlerTable::new();

    let table = {
        let ctx = ctx.clone();
        table.on(names::AVAILABILITY_RESULT, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let result: AvailabilityResult = envelope.decode()?;
                info!(
                    store = %result.store,
                    card = %result.card,
                    items = result.items.len(),
                    "availability result received"
                );
                ctx.tracker
                    .apply_result(&result.store, &result.card, result.items)
                    .await;
                Ok(())
            }
        })
    };

    let table = {
        let ctx = ctx.clone();
        table.on(names::CATALOG_CARD_NAMES_RESULT, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let result: CatalogCardNamesResult = envelope.decode()?;
                let added = ctx
                    .catalog
                    .add_card_names(&result.names)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                info!(received = result.names.len(), added, "card names upserted");
                Ok(())
            }
        })
    };

    let table = {
        let ctx = ctx.clone();
        table.on(names::CATALOG_SET_DATA_RESULT, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let result: CatalogSetDataResult = envelope.decode()?;
                let added = ctx
                    .catalog
                    .add_set_data(&result.sets)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                info!(received = result.sets.len(), added, "set data upserted");
                Ok(())
            }
        })
    };

    let table = {
        let ctx = ctx.clone();
        table.on(names::CATALOG_FINISHES_CHUNK_RESULT, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let result: CatalogFinishesChunkResult = envelope.decode()?;
                let added = ctx
                    .catalog
                    .bulk_add_finishes(&result.finishes)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                info!(received = result.finishes.len(), added, "finishes upserted");
                Ok(())
            }
        })
    };

    let table = {
        let ctx = ctx.clone();
        table.on(names::CATALOG_PRINTINGS_CHUNK_RESULT, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let result: CatalogPrintingsChunkResult = envelope.decode()?;
                info!(printings = result.printings.len(), "printings chunk received");
                upsert_printings_chunk(ctx.catalog.as_ref(), &result.printings)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                Ok(())
            }
        })
    };

    {
        let ctx = ctx.clone();
        table.on(names::JOB_INTERRUPTED, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let notice: JobInterrupted = envelope.decode()?;
                ctx.notifier
                    .job_interrupted(&notice.user, &notice.card, &notice.message)
                    .await;
                Ok(())
            }
        })
    }
}
