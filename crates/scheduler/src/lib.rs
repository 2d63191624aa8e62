//! Scheduler role: consumes `scheduler-requests` and fans out jobs.
//!
//! The scheduler never scrapes anything itself — it validates incoming
//! commands, resolves them against the user directory, and forwards jobs
//! to the distributed queue through the task dispatcher. It also owns
//! the recurring-job registrations.

use std::sync::Arc;

use tracing::{info, warn};

use cardwatch_bus::messages::{names, AvailabilityRequest, QueueAllAvailabilityChecks};
use cardwatch_bus::HandlerTable;
use cardwatch_queue::{task_ids, RecurringScheduler, TaskDispatcher};
use cardwatch_queue::recurring::{AVAILABILITY_UPDATE_INTERVAL, CATALOG_UPDATE_INTERVAL};
use cardwatch_store::UserDirectory;
use cardwatch_worker::CheckSingleCardArgs;

/// Dependencies for the request handlers.
pub struct SchedulerContext {
    pub dispatcher: Arc<TaskDispatcher>,
    pub users: Arc<dyn UserDirectory>,
}

/// Build the `scheduler-requests` handler table.
///
/// Payload validation is the decode step: a request missing required
/// fields fails decoding, which the listener turns into a dead-lettered
/// message.
pub fn request_handlers(ctx: Arc<SchedulerContext>) -> HandlerTable {
    let table = HandlerTable::new();

    let table = {
        let ctx = ctx.clone();
        table.on(names::AVAILABILITY_REQUEST, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let request: AvailabilityRequest = envelope.decode()?;
                handle_availability_request(&ctx, request).await;
                Ok(())
            }
        })
    };

    {
        let ctx = ctx.clone();
        table.on(names::QUEUE_ALL_AVAILABILITY_CHECKS, move |envelope| {
            let ctx = ctx.clone();
            async move {
                let request: QueueAllAvailabilityChecks = envelope.decode()?;
                handle_queue_all_availability_checks(&ctx, request).await;
                Ok(())
            }
        })
    }
}

/// One explicit check: queue a single-card job.
async fn handle_availability_request(ctx: &SchedulerContext, request: AvailabilityRequest) {
    info!(
        user = %request.user,
        store = %request.store_slug,
        card = %request.card_data.card_name,
        "availability request received"
    );
    let args = CheckSingleCardArgs {
        username: request.user,
        store_slug: request.store_slug,
        card: request.card_data,
    };
    ctx.dispatcher.enqueue(task_ids::CHECK_SINGLE_CARD, &args).await;
}

/// Fan out one job per tracked card × preferred store for one user.
async fn handle_queue_all_availability_checks(
    ctx: &SchedulerContext,
    request: QueueAllAvailabilityChecks,
) {
    let stores = ctx.users.get_user_stores(&request.username).await;
    let cards = ctx.users.load_card_list(&request.username).await;

    if stores.is_empty() {
        warn!(user = %request.username, "user has no preferred stores, nothing to queue");
        return;
    }

    let mut queued = 0u32;
    for store_slug in &stores {
        for card in &cards {
            let args = CheckSingleCardArgs {
                username: request.username.clone(),
                store_slug: store_slug.clone(),
                card: card.clone(),
            };
            ctx.dispatcher.enqueue(task_ids::CHECK_SINGLE_CARD, &args).await;
            queued += 1;
        }
    }
    info!(user = %request.username, jobs = queued, "queued availability checks");
}

/// Register the recurring jobs. Idempotent — safe to call on every
/// restart.
pub async fn register_recurring(scheduler: &RecurringScheduler) {
    scheduler
        .schedule_if_absent(
            task_ids::FULL_CATALOG_JOB_ID,
            task_ids::UPDATE_FULL_CATALOG,
            serde_json::json!({}),
            CATALOG_UPDATE_INTERVAL,
        )
        .await;
    scheduler
        .schedule_if_absent(
            task_ids::AVAILABILITY_SWEEP_JOB_ID,
            task_ids::SWEEP_ALL_AVAILABILITY,
            serde_json::json!({}),
            AVAILABILITY_UPDATE_INTERVAL,
        )
        .await;
}
