use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work handed to the distributed job queue.
///
/// The `task_id` is symbolic — it is resolved against a process-local
/// registry on both the enqueue side (membership check) and the execute
/// side (callable lookup), so the descriptor itself carries no code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub task_id: String,
    pub args: serde_json::Value,
    pub job_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new<T: Serialize>(
        task_id: impl Into<String>,
        args: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            task_id: task_id.into(),
            args: serde_json::to_value(args)?,
            job_id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
        })
    }

    /// Deserialize the args into the task's expected shape.
    pub fn decode_args<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.args.clone())
    }
}
