use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::executor::TaskRegistry;
use crate::job::JobDescriptor;
use crate::queue::JobQueue;

/// Enqueue-side indirection from symbolic task ids to the job queue.
///
/// Queuing failures never propagate to the caller: an unknown task id or
/// a queue error is logged and swallowed, because the callers (channel
/// listeners, recurring jobs) must keep running regardless.
pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
    queue: Arc<dyn JobQueue>,
}

impl TaskDispatcher {
    pub fn new(registry: Arc<TaskRegistry>, queue: Arc<dyn JobQueue>) -> Self {
        Self { registry, queue }
    }

    /// Look up `task_id` and forward a job to the queue.
    ///
    /// Unknown ids log an error and return without enqueuing anything.
    pub async fn enqueue<T: Serialize>(&self, task_id: &str, args: &T) {
        if !self.registry.contains(task_id) {
            error!(task_id, "attempted to queue unknown task");
            return;
        }

        let job = match JobDescriptor::new(task_id, args) {
            Ok(job) => job,
            Err(e) => {
                error!(task_id, error = %e, "failed to encode job args");
                return;
            }
        };

        let job_id = job.job_id;
        match self.queue.enqueue(job).await {
            Ok(()) => {
                info!(task_id, %job_id, "queued task");
            }
            Err(e) => {
                error!(task_id, %job_id, error = %e, "failed to queue task");
            }
        }
    }
}
