//! The explicitly owned delivery pipeline: courier, queue, worker pool, ledger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use herald_common::config::AppConfig;
use herald_common::types::{Message, PerRecipientResult};

use crate::courier::{Courier, DispatchRequest};
use crate::error::{DispatchError, LedgerError};
use crate::ledger::MessageLedger;
use crate::loaders::Loaders;
use crate::queue::DeliveryQueue;
use crate::transport::MailTransport;
use crate::worker::{DEFAULT_WORKER_COUNT, WorkerPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: 1000,
            enqueue_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for DeliverySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            queue_capacity: config.queue_capacity,
            enqueue_timeout: Duration::from_millis(config.queue_enqueue_timeout_ms),
        }
    }
}

pub struct DeliverySystem {
    courier: Courier,
    ledger: Arc<dyn MessageLedger>,
    queue: Arc<DeliveryQueue>,
    workers: Mutex<Option<WorkerPool>>,
}

impl DeliverySystem {
    /// Build the queue and start the worker pool. Must run inside a tokio runtime.
    pub fn start(
        settings: DeliverySettings,
        loaders: Loaders,
        ledger: Arc<dyn MessageLedger>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let queue = Arc::new(DeliveryQueue::new(
            settings.queue_capacity,
            settings.enqueue_timeout,
        ));
        let workers = WorkerPool::spawn(
            settings.worker_count,
            Arc::clone(&queue),
            transport,
            Arc::clone(&ledger),
        );
        let courier = Courier::new(loaders, Arc::clone(&ledger), Arc::clone(&queue));

        Self {
            courier,
            ledger,
            queue,
            workers: Mutex::new(Some(workers)),
        }
    }

    /// Accept a notification for delivery. Returns once every job is enqueued.
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<Vec<PerRecipientResult>, DispatchError> {
        self.courier.dispatch(request).await
    }

    pub async fn get_message(&self, message_id: Uuid) -> Result<Message, LedgerError> {
        self.ledger.get(message_id).await
    }

    /// Close the queue and wait for workers to finish their jobs. Idempotent.
    pub async fn shutdown(&self) {
        self.queue.close();
        let workers = self.workers.lock().await.take();
        if let Some(pool) = workers {
            tracing::info!(
                workers = pool.size(),
                "Waiting for delivery workers to drain"
            );
            pool.join().await;
        }
    }
}
