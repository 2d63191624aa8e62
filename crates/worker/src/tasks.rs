//! Worker task implementations.
//!
//! Every dependency comes in through [`TaskContext`] — registries and
//! stores are constructed at role startup and injected, so the tasks are
//! testable without any process-global state. The scheduler builds the
//! same registry to validate task ids at enqueue time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cardwatch_bus::messages::{names, AvailabilityResult, CatalogCardNamesResult, CatalogSetDataResult};
use cardwatch_bus::{Channel, Envelope, EventPublisher};
use cardwatch_core::TrackedCard;

use cardwatch_catalog::{CardFeed, CatalogIngestor};
use cardwatch_queue::{task_ids, JobDescriptor, JobQueue, QueueError, TaskRegistry};
use cardwatch_store::{AvailabilityCache, StoreRegistry, UserDirectory};

/// Everything the worker tasks touch.
pub struct TaskContext {
    pub stores: Arc<StoreRegistry>,
    pub cache: Arc<AvailabilityCache>,
    pub users: Arc<dyn UserDirectory>,
    pub publisher: Arc<dyn EventPublisher>,
    pub feed: Arc<dyn CardFeed>,
    /// Used by the sweep task to fan out per-card jobs.
    pub queue: Arc<dyn JobQueue>,
}

/// Args for [`task_ids::CHECK_SINGLE_CARD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSingleCardArgs {
    pub username: String,
    pub store_slug: String,
    pub card: TrackedCard,
}

/// Register every worker task against the given context.
pub fn build_registry(ctx: Arc<TaskContext>) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    {
        let ctx = ctx.clone();
        registry.register(task_ids::CHECK_SINGLE_CARD, move |args| {
            let ctx = ctx.clone();
            async move {
                let args: CheckSingleCardArgs = serde_json::from_value(args)?;
                check_single_card(&ctx, args).await
            }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register(task_ids::SWEEP_ALL_AVAILABILITY, move |_args| {
            let ctx = ctx.clone();
            async move { sweep_all_availability(&ctx).await }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register(task_ids::UPDATE_CARD_CATALOG, move |_args| {
            let ctx = ctx.clone();
            async move { update_card_catalog(&ctx).await }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register(task_ids::UPDATE_SET_CATALOG, move |_args| {
            let ctx = ctx.clone();
            async move { update_set_catalog(&ctx).await }
        });
    }

    {
        let ctx = ctx.clone();
        registry.register(task_ids::UPDATE_FULL_CATALOG, move |_args| {
            let ctx = ctx.clone();
            async move { update_full_catalog(&ctx).await }
        });
    }

    registry
}

/// Scrape one (store, card), cache the result, and publish it on the
/// results channel. An empty result is a valid out-of-stock answer and
/// flows through the same path.
async fn check_single_card(ctx: &TaskContext, args: CheckSingleCardArgs) -> Result<(), QueueError> {
    let items = ctx
        .stores
        .check_availability(&args.store_slug, &args.card)
        .await;

    ctx.cache
        .set(&args.store_slug, &args.card.card_name, items.clone())
        .await;

    let payload = AvailabilityResult {
        store: args.store_slug.clone(),
        card: args.card.card_name.clone(),
        items,
    };
    publish_result(ctx, names::AVAILABILITY_RESULT, &payload).await;

    info!(
        user = %args.username,
        store = %args.store_slug,
        card = %args.card.card_name,
        "availability check complete"
    );
    Ok(())
}

/// Fan out one `check_single_card` job per card × preferred store for
/// every user. Durability of the fan-out rides on the job queue, not on
/// any particular worker staying alive.
async fn sweep_all_availability(ctx: &TaskContext) -> Result<(), QueueError> {
    let usernames = ctx.users.list_usernames().await;
    let mut queued = 0u32;

    for username in usernames {
        let stores = ctx.users.get_user_stores(&username).await;
        let cards = ctx.users.load_card_list(&username).await;

        for store_slug in &stores {
            for card in &cards {
                let args = CheckSingleCardArgs {
                    username: username.clone(),
                    store_slug: store_slug.clone(),
                    card: card.clone(),
                };
                let job = JobDescriptor::new(task_ids::CHECK_SINGLE_CARD, &args)?;
                match ctx.queue.enqueue(job).await {
                    Ok(()) => queued += 1,
                    Err(e) => {
                        warn!(user = %username, store = %store_slug, error = %e, "failed to queue check");
                    }
                }
            }
        }
    }

    info!(jobs = queued, "availability sweep fanned out");
    Ok(())
}

async fn update_card_catalog(ctx: &TaskContext) -> Result<(), QueueError> {
    let names_list = match ctx.feed.card_names().await {
        Ok(names_list) => names_list,
        Err(e) => {
            warn!(error = %e, "could not fetch card names, catalog update skipped");
            return Ok(());
        }
    };

    if names_list.is_empty() {
        warn!("card name catalog came back empty, nothing to publish");
        return Ok(());
    }

    info!(names = names_list.len(), "publishing card name catalog");
    let payload = CatalogCardNamesResult { names: names_list };
    publish_result(ctx, names::CATALOG_CARD_NAMES_RESULT, &payload).await;
    Ok(())
}

async fn update_set_catalog(ctx: &TaskContext) -> Result<(), QueueError> {
    let sets = match ctx.feed.sets().await {
        Ok(sets) => sets,
        Err(e) => {
            warn!(error = %e, "could not fetch set data, catalog update skipped");
            return Ok(());
        }
    };

    if sets.is_empty() {
        warn!("set catalog came back empty, nothing to publish");
        return Ok(());
    }

    info!(sets = sets.len(), "publishing set catalog");
    let payload = CatalogSetDataResult { sets };
    publish_result(ctx, names::CATALOG_SET_DATA_RESULT, &payload).await;
    Ok(())
}

/// Full refresh: names and sets land first so the printing chunks can
/// resolve against them, then the chunked bulk stream runs.
async fn update_full_catalog(ctx: &TaskContext) -> Result<(), QueueError> {
    update_set_catalog(ctx).await?;
    update_card_catalog(ctx).await?;

    let ingestor = CatalogIngestor::new(ctx.publisher.clone());
    match ingestor.run(ctx.feed.as_ref()).await {
        Ok(report) => {
            info!(
                records = report.records,
                chunks = report.chunks_published,
                failed_chunks = report.chunks_failed,
                "full catalog refresh finished"
            );
        }
        Err(e) => {
            warn!(error = %e, "full catalog refresh could not open the bulk stream");
        }
    }
    Ok(())
}

/// Best-effort publish: results are push notifications, and a broker
/// hiccup must not fail the job that produced the data.
async fn publish_result<T: Serialize>(ctx: &TaskContext, name: &str, payload: &T) {
    let envelope = match Envelope::new(name, payload) {
        Ok(env) => env,
        Err(e) => {
            warn!(name, error = %e, "failed to encode result payload");
            return;
        }
    };
    if let Err(e) = ctx.publisher.publish(Channel::WorkerResults, envelope).await {
        warn!(name, error = %e, "failed to publish result");
    }
}
