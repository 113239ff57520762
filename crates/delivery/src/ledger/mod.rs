//! Per-message delivery status ledger.
//!
//! Rows are created by the courier before a job is enqueued and updated by the
//! worker that owns the job. Each call is one independent single-row write;
//! updates are last-write-wins.

mod memory;
mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PgMessageLedger;

use async_trait::async_trait;
use uuid::Uuid;

use herald_common::types::{Message, MessageStatus};

use crate::error::LedgerError;

#[async_trait]
pub trait MessageLedger: Send + Sync {
    /// Insert a new row in status `queued`.
    async fn create(&self, message_id: Uuid, recipient: &str) -> Result<Message, LedgerError>;

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        reason: Option<&str>,
    ) -> Result<(), LedgerError>;

    /// Fails with [`LedgerError::NotFound`] for an unknown ID.
    async fn get(&self, message_id: Uuid) -> Result<Message, LedgerError>;
}
