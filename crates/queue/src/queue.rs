use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::JobDescriptor;

/// Producer side of the distributed job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job to the queue for some worker to pull.
    async fn enqueue(&self, job: JobDescriptor) -> Result<(), QueueError>;
}

/// Blanket implementation so `Arc<dyn JobQueue>` can be used directly.
#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for std::sync::Arc<T> {
    async fn enqueue(&self, job: JobDescriptor) -> Result<(), QueueError> {
        (**self).enqueue(job).await
    }
}

/// Consumer side of the distributed job queue.
///
/// Workers pull one job at a time — there is no in-process job
/// parallelism; horizontal scale comes from more worker processes.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Pull the next job. Blocks until one is available.
    async fn poll(&self) -> Result<JobDescriptor, QueueError>;

    /// Mark a pulled job as done.
    async fn ack(&self, job: &JobDescriptor) -> Result<(), QueueError>;

    /// Return a pulled job for re-delivery (e.g. shutdown mid-job).
    async fn nack(&self, job: &JobDescriptor) -> Result<(), QueueError>;
}

/// In-process job queue backing single-process deployments and tests.
///
/// Pulled jobs sit in an in-flight map until acked; nacking moves a job
/// back to the front of the pending queue for re-delivery.
#[derive(Default)]
pub struct MemoryJobQueue {
    pending: Mutex<VecDeque<JobDescriptor>>,
    in_flight: Mutex<HashMap<Uuid, JobDescriptor>>,
    available: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: JobDescriptor) -> Result<(), QueueError> {
        self.pending.lock().await.push_back(job);
        self.available.notify_one();
        Ok(())
    }
}

#[async_trait]
impl JobConsumer for MemoryJobQueue {
    async fn poll(&self) -> Result<JobDescriptor, QueueError> {
        loop {
            if let Some(job) = self.pending.lock().await.pop_front() {
                self.in_flight.lock().await.insert(job.job_id, job.clone());
                return Ok(job);
            }
            self.available.notified().await;
        }
    }

    async fn ack(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        self.in_flight.lock().await.remove(&job.job_id);
        Ok(())
    }

    async fn nack(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let job = self
            .in_flight
            .lock()
            .await
            .remove(&job.job_id)
            .unwrap_or_else(|| job.clone());
        self.pending.lock().await.push_front(job);
        self.available.notify_one();
        Ok(())
    }
}
