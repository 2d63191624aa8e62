use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::QueueError;
use crate::job::JobDescriptor;

/// Boxed async task body. Receives the job's JSON args.
pub type TaskFn = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send>>
        + Send
        + Sync,
>;

/// Process-local table of symbolic task ids to callables.
///
/// Both the scheduler and the worker construct one at startup from the
/// same task definitions, so the enqueue-side membership check and the
/// execute-side lookup always agree. Explicitly constructed and passed
/// in — never a global.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskFn>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable under a task id.
    ///
    /// Re-registering an id replaces the callable with a warning — it is
    /// usually a sign two task modules picked the same name.
    pub fn register<F, Fut>(&mut self, task_id: impl Into<String>, task: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), QueueError>> + Send + 'static,
    {
        let task_id = task_id.into();
        let previous = self.tasks.insert(
            task_id.clone(),
            Arc::new(move |args| Box::pin(task(args))),
        );
        if previous.is_some() {
            warn!(task_id = %task_id, "task id re-registered, replacing callable");
        } else {
            debug!(task_id = %task_id, "task registered");
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn get(&self, task_id: &str) -> Option<TaskFn> {
        self.tasks.get(task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// What happened to one executed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    /// The task id was not in the registry. The job is still consumed —
    /// an unknown id must not poison the queue.
    UnknownTask,
}

/// Worker-side execution of pulled jobs against a [`TaskRegistry`].
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    /// Run one job to completion. Task failures are logged and reported
    /// in the outcome, never propagated as errors — the job loop decides
    /// what to do with them.
    pub async fn execute(&self, job: &JobDescriptor) -> TaskOutcome {
        let Some(task) = self.registry.get(&job.task_id) else {
            error!(task_id = %job.task_id, job_id = %job.job_id, "unknown task id in pulled job");
            return TaskOutcome::UnknownTask;
        };

        info!(task_id = %job.task_id, job_id = %job.job_id, "executing job");
        match task(job.args.clone()).await {
            Ok(()) => {
                info!(task_id = %job.task_id, job_id = %job.job_id, "job completed");
                TaskOutcome::Completed
            }
            Err(e) => {
                error!(task_id = %job.task_id, job_id = %job.job_id, error = %e, "job failed");
                TaskOutcome::Failed
            }
        }
    }
}
