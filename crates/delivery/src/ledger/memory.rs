use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use herald_common::types::{Message, MessageStatus};

use crate::error::LedgerError;
use crate::ledger::MessageLedger;

/// A ledger kept in a `HashMap`, for tests and local runs.
#[derive(Default)]
pub struct InMemoryLedger {
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// Snapshot of every row.
    pub async fn all(&self) -> Vec<Message> {
        self.messages.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl MessageLedger for InMemoryLedger {
    async fn create(&self, message_id: Uuid, recipient: &str) -> Result<Message, LedgerError> {
        let mut messages = self.messages.lock().await;
        if messages.contains_key(&message_id) {
            return Err(LedgerError::Duplicate(message_id));
        }

        let message = Message {
            id: message_id,
            recipient: recipient.to_string(),
            status: MessageStatus::Queued,
            reason: None,
            updated_at: Utc::now(),
        };
        messages.insert(message_id, message.clone());
        Ok(message)
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        reason: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut messages = self.messages.lock().await;
        let message = messages
            .get_mut(&message_id)
            .ok_or(LedgerError::NotFound(message_id))?;

        message.status = status;
        message.reason = reason.map(str::to_string);
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, message_id: Uuid) -> Result<Message, LedgerError> {
        self.messages
            .lock()
            .await
            .get(&message_id)
            .cloned()
            .ok_or(LedgerError::NotFound(message_id))
    }
}
