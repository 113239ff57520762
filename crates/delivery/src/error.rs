//! Error taxonomy for the delivery pipeline.
//!
//! Only [`DispatchError`] aborts a whole dispatch. Every other error here is
//! scoped to one recipient or one job and ends up in a per-recipient result or
//! in the message ledger.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use herald_common::error::AppError;

/// Failure reported by an external enrichment collaborator.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Errors that abort an entire dispatch before anything is enqueued.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The access token could not be obtained.
    #[error("Authentication error: {0}")]
    Authentication(#[source] LoaderError),

    /// Membership or identity lookup for the audience failed.
    #[error("Audience resolution error: {0}")]
    AudienceResolution(#[source] LoaderError),
}

/// Template rendering failure for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown template variable '{0}'")]
    UnknownVariable(String),

    #[error("template variable '{0}' has no value for this recipient")]
    MissingValue(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue stayed full for the whole enqueue timeout.
    #[error("delivery queue full (waited {0:?})")]
    Full(Duration),

    #[error("delivery queue is closed")]
    Closed,
}

/// Mail transport outcome classification.
///
/// Transient errors leave the message `failed` (eligible for external
/// re-dispatch); permanent errors make it `undeliverable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Transient send failure: {0}")]
    Transient(String),

    #[error("Permanent send failure: {0}")]
    Permanent(String),
}

impl SendError {
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Message {0} not found")]
    NotFound(Uuid),

    #[error("Message {0} already exists")]
    Duplicate(Uuid),
}

impl From<DispatchError> for AppError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Authentication(e) => {
                AppError::Upstream(format!("failed to obtain access token: {}", e))
            }
            DispatchError::AudienceResolution(LoaderError::NotFound(what)) => {
                AppError::NotFound(what)
            }
            DispatchError::AudienceResolution(e) => {
                AppError::Upstream(format!("failed to resolve audience: {}", e))
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Database(e) => AppError::Database(e),
            LedgerError::NotFound(id) => AppError::NotFound(format!("Message {} not found", id)),
            LedgerError::Duplicate(id) => {
                AppError::Internal(format!("Message {} already exists", id))
            }
        }
    }
}
