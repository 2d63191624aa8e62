//! The worker's job loop.
//!
//! One job at a time: poll, execute, ack. No in-process job parallelism —
//! horizontal scale comes from running more worker processes against the
//! same pipeline. A shutdown signal mid-job notifies the original
//! requester that the job will be retried and nacks it for the queue's
//! re-delivery; there is no cooperative cancellation token.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{error, info, warn};

use cardwatch_bus::messages::{names, JobInterrupted};
use cardwatch_bus::{Channel, Envelope, EventPublisher};
use cardwatch_queue::{task_ids, JobConsumer, JobDescriptor, TaskExecutor};

use crate::tasks::CheckSingleCardArgs;

pub struct WorkerLoop {
    consumer: Arc<dyn JobConsumer>,
    executor: TaskExecutor,
    publisher: Arc<dyn EventPublisher>,
    shutdown: Arc<Notify>,
}

impl WorkerLoop {
    pub fn new(
        consumer: Arc<dyn JobConsumer>,
        executor: TaskExecutor,
        publisher: Arc<dyn EventPublisher>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            consumer,
            executor,
            publisher,
            shutdown,
        }
    }

    /// Pull and execute jobs until shutdown.
    pub async fn run(&self) {
        info!("worker job loop started");
        loop {
            let job = tokio::select! {
                job = self.consumer.poll() => job,
                _ = self.shutdown.notified() => {
                    info!("shutdown while idle");
                    break;
                }
            };

            let job = match job {
                Ok(job) => job,
                Err(e) => {
                    error!(error = %e, "job poll failed, stopping loop");
                    break;
                }
            };

            tokio::select! {
                outcome = self.executor.execute(&job) => {
                    // Failed jobs are acked too: the failure was logged at
                    // the task level and blind re-delivery would just fail
                    // again. Re-delivery is reserved for interruption.
                    let _ = outcome;
                    if let Err(e) = self.consumer.ack(&job).await {
                        warn!(job_id = %job.job_id, error = %e, "ack failed");
                    }
                }
                _ = self.shutdown.notified() => {
                    warn!(job_id = %job.job_id, task_id = %job.task_id, "shutdown mid-job");
                    self.notify_interrupted(&job).await;
                    if let Err(e) = self.consumer.nack(&job).await {
                        error!(job_id = %job.job_id, error = %e, "nack for re-delivery failed");
                    }
                    break;
                }
            }
        }
        info!("worker job loop stopped");
    }

    /// Tell the original requester their check will be retried.
    async fn notify_interrupted(&self, job: &JobDescriptor) {
        if job.task_id != task_ids::CHECK_SINGLE_CARD {
            return;
        }
        let Ok(args) = job.decode_args::<CheckSingleCardArgs>() else {
            warn!(job_id = %job.job_id, "could not decode interrupted job args");
            return;
        };

        let payload = JobInterrupted {
            user: args.username,
            card: args.card.card_name,
            message: "Worker is shutting down, job will be retried.".into(),
        };
        match Envelope::new(names::JOB_INTERRUPTED, &payload) {
            Ok(envelope) => {
                if let Err(e) = self.publisher.publish(Channel::WorkerResults, envelope).await {
                    warn!(error = %e, "failed to publish interruption notice");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to encode interruption notice");
            }
        }
    }
}
