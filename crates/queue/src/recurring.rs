use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatcher::TaskDispatcher;

/// Run the full catalog refresh once every 24 hours.
pub const CATALOG_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Run the availability sweep every 15 minutes.
pub const AVAILABILITY_UPDATE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Interval-job scheduler layered on the task dispatcher.
///
/// Each job enqueues its task immediately and then on every interval
/// tick. Registration is idempotent by job id: re-registering an
/// already-scheduled id is a no-op, which prevents duplicate recurring
/// jobs when a role restarts and re-runs its setup.
pub struct RecurringScheduler {
    dispatcher: Arc<TaskDispatcher>,
    scheduled: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RecurringScheduler {
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self {
            dispatcher,
            scheduled: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `task_id` to be enqueued every `interval`, unless a job
    /// with this `job_id` is already scheduled. Returns whether a new
    /// job was created.
    pub async fn schedule_if_absent(
        &self,
        job_id: &str,
        task_id: &str,
        args: serde_json::Value,
        interval: Duration,
    ) -> bool {
        let mut scheduled = self.scheduled.lock().await;
        if scheduled.contains_key(job_id) {
            warn!(job_id, "recurring job already scheduled, skipping");
            return false;
        }

        info!(
            job_id,
            task_id,
            interval_secs = interval.as_secs(),
            "scheduling recurring job"
        );

        let dispatcher = self.dispatcher.clone();
        let task_id = task_id.to_string();
        let handle = tokio::spawn(async move {
            loop {
                dispatcher.enqueue(&task_id, &args).await;
                tokio::time::sleep(interval).await;
            }
        });

        scheduled.insert(job_id.to_string(), handle);
        true
    }

    pub async fn is_scheduled(&self, job_id: &str) -> bool {
        self.scheduled.lock().await.contains_key(job_id)
    }

    /// Cancel every recurring job. Called on role shutdown.
    pub async fn shutdown(&self) {
        let mut scheduled = self.scheduled.lock().await;
        for (job_id, handle) in scheduled.drain() {
            info!(job_id = %job_id, "cancelling recurring job");
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskRegistry;
    use crate::queue::{JobConsumer, MemoryJobQueue};
    use crate::task_ids;

    fn dispatcher(queue: Arc<MemoryJobQueue>) -> Arc<TaskDispatcher> {
        let mut registry = TaskRegistry::new();
        registry.register(task_ids::UPDATE_FULL_CATALOG, |_| async { Ok(()) });
        Arc::new(TaskDispatcher::new(Arc::new(registry), queue))
    }

    #[tokio::test]
    async fn schedules_and_enqueues_immediately() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = RecurringScheduler::new(dispatcher(queue.clone()));

        let created = scheduler
            .schedule_if_absent(
                task_ids::FULL_CATALOG_JOB_ID,
                task_ids::UPDATE_FULL_CATALOG,
                serde_json::json!({}),
                Duration::from_secs(3600),
            )
            .await;
        assert!(created);
        assert!(scheduler.is_scheduled(task_ids::FULL_CATALOG_JOB_ID).await);

        // The first run happens right away, not after the first interval.
        let job = tokio::time::timeout(Duration::from_secs(1), queue.poll())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.task_id, task_ids::UPDATE_FULL_CATALOG);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn re_registering_same_job_id_is_a_no_op() {
        let queue = Arc::new(MemoryJobQueue::new());
        let scheduler = RecurringScheduler::new(dispatcher(queue.clone()));

        let first = scheduler
            .schedule_if_absent(
                task_ids::FULL_CATALOG_JOB_ID,
                task_ids::UPDATE_FULL_CATALOG,
                serde_json::json!({}),
                Duration::from_secs(3600),
            )
            .await;
        let second = scheduler
            .schedule_if_absent(
                task_ids::FULL_CATALOG_JOB_ID,
                task_ids::UPDATE_FULL_CATALOG,
                serde_json::json!({}),
                Duration::from_secs(3600),
            )
            .await;

        assert!(first);
        assert!(!second, "duplicate registration must be a no-op");

        // Only the single immediate enqueue from the first registration.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.pending_len().await, 1);

        scheduler.shutdown().await;
    }
}
