//! Fixed-size pool of delivery workers.
//!
//! Each worker loops: dequeue one job, mark it `sending`, hand it to the mail
//! transport, write the terminal status, repeat. A worker holds at most one job
//! at a time and exits once the queue is closed and drained.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use herald_common::types::{DeliveryJob, MessageStatus};

use crate::ledger::MessageLedger;
use crate::queue::DeliveryQueue;
use crate::transport::MailTransport;

pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Attempts made to record a terminal status before giving up.
const LEDGER_WRITE_ATTEMPTS: u32 = 3;

/// Handle to the spawned workers.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers consuming from `queue`.
    pub fn spawn(
        count: usize,
        queue: Arc<DeliveryQueue>,
        transport: Arc<dyn MailTransport>,
        ledger: Arc<dyn MessageLedger>,
    ) -> Self {
        let count = count.max(1);
        let workers = (0..count)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    transport: Arc::clone(&transport),
                    ledger: Arc::clone(&ledger),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(workers = count, "Delivery worker pool started");
        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit. Returns once the queue has been closed
    /// and every in-flight job has reached a terminal status.
    pub async fn join(self) {
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Delivery worker terminated abnormally");
            }
        }
        tracing::info!("Delivery worker pool stopped");
    }
}

struct Worker {
    id: usize,
    queue: Arc<DeliveryQueue>,
    transport: Arc<dyn MailTransport>,
    ledger: Arc<dyn MessageLedger>,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker = self.id, "Delivery worker started");

        while let Some(job) = self.queue.dequeue().await {
            self.process(job).await;
        }

        tracing::debug!(worker = self.id, "Delivery worker exiting, queue closed");
    }

    async fn process(&self, job: DeliveryJob) {
        let message_id = job.message_id;

        if let Err(e) = self
            .ledger
            .update_status(message_id, MessageStatus::Sending, None)
            .await
        {
            // Sending anyway: the terminal write below is what callers observe.
            tracing::warn!(
                worker = self.id,
                message_id = %message_id,
                error = %e,
                "Failed to mark message as sending"
            );
        }

        let (status, reason) = self.attempt(job).await;

        match status {
            MessageStatus::Delivered => {
                tracing::info!(worker = self.id, message_id = %message_id, "Message delivered")
            }
            _ => tracing::warn!(
                worker = self.id,
                message_id = %message_id,
                status = %status,
                reason = reason.as_deref().unwrap_or(""),
                "Message not delivered"
            ),
        }

        self.record(message_id, status, reason.as_deref()).await;
    }

    /// Run the send on its own task so a panicking transport is reported as a
    /// failure instead of killing the worker.
    async fn attempt(&self, job: DeliveryJob) -> (MessageStatus, Option<String>) {
        let transport = Arc::clone(&self.transport);
        let outcome = tokio::spawn(async move { transport.send(&job).await }).await;

        match outcome {
            Ok(Ok(())) => (MessageStatus::Delivered, None),
            Ok(Err(e)) if e.is_permanent() => (MessageStatus::Undeliverable, Some(e.to_string())),
            Ok(Err(e)) => (MessageStatus::Failed, Some(e.to_string())),
            Err(e) => (
                MessageStatus::Failed,
                Some(format!("internal error during send: {}", e)),
            ),
        }
    }

    async fn record(&self, message_id: Uuid, status: MessageStatus, reason: Option<&str>) {
        for attempt in 1..=LEDGER_WRITE_ATTEMPTS {
            match self.ledger.update_status(message_id, status, reason).await {
                Ok(()) => return,
                Err(e) if attempt < LEDGER_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        worker = self.id,
                        message_id = %message_id,
                        attempt,
                        error = %e,
                        "Failed to record delivery status, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(e) => tracing::error!(
                    worker = self.id,
                    message_id = %message_id,
                    status = %status,
                    error = %e,
                    "Giving up recording delivery status"
                ),
            }
        }
    }
}
