use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::types::{Message, MessageStatus};

use crate::error::LedgerError;
use crate::ledger::MessageLedger;

/// PostgreSQL-backed ledger over the `messages` table.
#[derive(Clone)]
pub struct PgMessageLedger {
    pool: PgPool,
}

impl PgMessageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLedger for PgMessageLedger {
    async fn create(&self, message_id: Uuid, recipient: &str) -> Result<Message, LedgerError> {
        let now = Utc::now();

        let message: Option<Message> = sqlx::query_as(
            r#"
            INSERT INTO messages (id, recipient, status, reason, created_at, updated_at)
            VALUES ($1, $2, $3, NULL, $4, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, recipient, status, reason, updated_at
            "#,
        )
        .bind(message_id)
        .bind(recipient)
        .bind(MessageStatus::Queued.to_string())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        message.ok_or(LedgerError::Duplicate(message_id))
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        reason: Option<&str>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $1, reason = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(status.to_string())
        .bind(reason)
        .bind(Utc::now())
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(message_id));
        }

        tracing::debug!(message_id = %message_id, status = %status, "Message status updated");
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> Result<Message, LedgerError> {
        let message: Message = sqlx::query_as(
            "SELECT id, recipient, status, reason, updated_at FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound(message_id))?;

        Ok(message)
    }
}
