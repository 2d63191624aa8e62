use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cardwatch_bus::{Envelope, PipelineReceiver, PipelineSender};

use crate::error::QueueError;
use crate::job::JobDescriptor;
use crate::queue::{JobConsumer, JobQueue};

/// Envelope name used for job descriptors on the work pipeline.
const JOB_ENVELOPE: &str = "job";

/// Distributed job queue riding the ZeroMQ PUSH/PULL pipeline.
///
/// The scheduler holds the sender; each worker process holds a consumer.
/// ZeroMQ's round-robin PUSH distribution load-balances jobs across
/// worker processes, and its high-water mark provides backpressure.
pub struct PipelineJobQueue {
    sender: Arc<dyn PipelineSender>,
}

impl PipelineJobQueue {
    pub fn new(sender: Arc<dyn PipelineSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl JobQueue for PipelineJobQueue {
    async fn enqueue(&self, job: JobDescriptor) -> Result<(), QueueError> {
        let envelope = Envelope::new(JOB_ENVELOPE, &job)?;
        self.sender.send(envelope).await?;
        debug!(task_id = %job.task_id, job_id = %job.job_id, "job pushed to pipeline");
        Ok(())
    }
}

/// Worker-side consumer for the pipeline queue.
///
/// `ack` is a no-op — a pulled envelope is already gone from the
/// pipeline. `nack` re-pushes the descriptor through the sender, which is
/// the re-delivery path a worker uses when shut down mid-job.
pub struct PipelineJobConsumer {
    receiver: Box<dyn PipelineReceiver>,
    redelivery: Arc<dyn PipelineSender>,
}

impl PipelineJobConsumer {
    pub fn new(receiver: Box<dyn PipelineReceiver>, redelivery: Arc<dyn PipelineSender>) -> Self {
        Self {
            receiver,
            redelivery,
        }
    }
}

#[async_trait]
impl JobConsumer for PipelineJobConsumer {
    async fn poll(&self) -> Result<JobDescriptor, QueueError> {
        let envelope = self.receiver.recv().await?;
        Ok(envelope.decode::<JobDescriptor>()?)
    }

    async fn ack(&self, _job: &JobDescriptor) -> Result<(), QueueError> {
        Ok(())
    }

    async fn nack(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let envelope = Envelope::new(JOB_ENVELOPE, job)?;
        self.redelivery.send(envelope).await?;
        debug!(task_id = %job.task_id, job_id = %job.job_id, "job re-pushed for re-delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwatch_bus::BusError;
    use tokio::sync::Mutex;

    /// Pipeline pair backed by an in-memory channel.
    struct MockSender {
        tx: tokio::sync::mpsc::Sender<Envelope>,
    }

    #[async_trait]
    impl PipelineSender for MockSender {
        async fn send(&self, envelope: Envelope) -> Result<(), BusError> {
            self.tx
                .send(envelope)
                .await
                .map_err(|_| BusError::Transport("pipeline closed".into()))
        }
    }

    struct MockReceiver {
        rx: Mutex<tokio::sync::mpsc::Receiver<Envelope>>,
    }

    #[async_trait]
    impl PipelineReceiver for MockReceiver {
        async fn recv(&self) -> Result<Envelope, BusError> {
            self.rx
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| BusError::Transport("pipeline closed".into()))
        }
    }

    fn pipeline() -> (Arc<MockSender>, MockReceiver) {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        (
            Arc::new(MockSender { tx }),
            MockReceiver { rx: Mutex::new(rx) },
        )
    }

    #[tokio::test]
    async fn enqueue_poll_roundtrip() {
        let (sender, receiver) = pipeline();
        let queue = PipelineJobQueue::new(sender.clone());
        let consumer = PipelineJobConsumer::new(Box::new(receiver), sender);

        let job = JobDescriptor::new("check_single_card", &serde_json::json!({"user": "kara"}))
            .unwrap();
        queue.enqueue(job.clone()).await.unwrap();

        let pulled = consumer.poll().await.unwrap();
        assert_eq!(pulled, job);
        consumer.ack(&pulled).await.unwrap();
    }

    #[tokio::test]
    async fn nack_redelivers_through_pipeline() {
        let (sender, receiver) = pipeline();
        let queue = PipelineJobQueue::new(sender.clone());
        let consumer = PipelineJobConsumer::new(Box::new(receiver), sender);

        let job = JobDescriptor::new("update_full_catalog", &serde_json::json!({})).unwrap();
        queue.enqueue(job.clone()).await.unwrap();

        let pulled = consumer.poll().await.unwrap();
        consumer.nack(&pulled).await.unwrap();

        let redelivered = consumer.poll().await.unwrap();
        assert_eq!(redelivered.job_id, job.job_id);
    }
}
