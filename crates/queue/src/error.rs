use thiserror::Error;

/// Errors from the job queue layer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job encode/decode error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("bus error: {0}")]
    Bus(#[from] cardwatch_bus::BusError),

    #[error("queue closed")]
    Closed,

    #[error("task failed: {0}")]
    Task(String),
}
