//! In-memory delivery queue shared by the courier (producer) and the worker
//! pool (consumers).
//!
//! Built on a bounded tokio `mpsc` channel. Producers clone the sender, workers
//! take turns on the receiver behind an async mutex. Closing drops the queue's
//! sender: new enqueues fail immediately, and an enqueue still waiting for room
//! fails too. Jobs already accepted are still handed out, and once the buffer
//! drains every waiting worker gets `None`. An `Ok` from [`DeliveryQueue::enqueue`]
//! always means a worker will receive the job.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};

use herald_common::types::DeliveryJob;

use crate::error::QueueError;

pub struct DeliveryQueue {
    sender: Mutex<Option<mpsc::Sender<DeliveryJob>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<DeliveryJob>>,
    closed: watch::Sender<bool>,
    enqueue_timeout: Duration,
}

impl DeliveryQueue {
    pub fn new(capacity: usize, enqueue_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            closed,
            enqueue_timeout,
        }
    }

    /// Hand a job to the worker pool, waiting at most the enqueue timeout for
    /// room in the buffer. Fails with [`QueueError::Closed`] if the queue is
    /// closed before the job gets in.
    pub async fn enqueue(&self, job: DeliveryJob) -> Result<(), QueueError> {
        // Subscribe before taking the sender so a concurrent close is not missed.
        let mut closed = self.closed.subscribe();
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(QueueError::Closed)?;

        let message_id = job.message_id;
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                tracing::debug!(%message_id, "Delivery queue closed while enqueue was waiting");
                Err(QueueError::Closed)
            }
            sent = sender.send_timeout(job, self.enqueue_timeout) => match sent {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        message_id = %message_id,
                        timeout_ms = self.enqueue_timeout.as_millis() as u64,
                        "Delivery queue full, job rejected"
                    );
                    Err(QueueError::Full(self.enqueue_timeout))
                }
                Err(SendTimeoutError::Closed(_)) => Err(QueueError::Closed),
            },
        }
    }

    /// Wait for the next job. `None` means the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<DeliveryJob> {
        self.receiver.lock().await.recv().await
    }

    /// Stop accepting jobs. Idempotent.
    pub fn close(&self) {
        let previous = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        self.closed.send_replace(true);

        if previous.is_some() {
            tracing::info!("Delivery queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
