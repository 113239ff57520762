use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery status of a single message as recorded in the ledger.
///
/// `Queued → Sending → {Delivered | Failed | Undeliverable}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Sending,
    Delivered,
    /// Transient failure; eligible for external re-dispatch.
    Failed,
    /// Permanent rejection; never retried.
    Undeliverable,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Failed | MessageStatus::Undeliverable
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Queued => write!(f, "queued"),
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Undeliverable => write!(f, "undeliverable"),
        }
    }
}

/// Durable status record for one delivery, keyed by message ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub recipient: String,
    pub status: MessageStatus,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Who a recipient was addressed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecipientTarget {
    /// A platform user GUID, resolved to an email by the user-info loader.
    User(String),
    /// A literal email address.
    Email(String),
}

/// One addressee of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    target: RecipientTarget,
    email: Option<String>,
}

impl Recipient {
    pub fn user(guid: impl Into<String>) -> Self {
        Self {
            target: RecipientTarget::User(guid.into()),
            email: None,
        }
    }

    pub fn email(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            email: Some(address.clone()),
            target: RecipientTarget::Email(address),
        }
    }

    /// Returns a copy carrying the resolved email address.
    pub fn with_email(&self, email: impl Into<String>) -> Self {
        Self {
            target: self.target.clone(),
            email: Some(email.into()),
        }
    }

    pub fn target(&self) -> &RecipientTarget {
        &self.target
    }

    pub fn resolved_email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The GUID for user recipients, `None` for literal addresses.
    pub fn user_guid(&self) -> Option<&str> {
        match &self.target {
            RecipientTarget::User(guid) => Some(guid),
            RecipientTarget::Email(_) => None,
        }
    }

    /// The handle the recipient was addressed by (GUID or email).
    pub fn identifier(&self) -> &str {
        match &self.target {
            RecipientTarget::User(guid) => guid,
            RecipientTarget::Email(address) => address,
        }
    }
}

/// Subject/text/HTML fragments with `{{.Name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// One unit of work for a delivery worker: one rendered message to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub message_id: Uuid,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub client_id: String,
    pub kind_id: String,
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Synchronous acceptance status reported to the caller of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptanceStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "failed to load")]
    FailedToLoad,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "undeliverable")]
    Undeliverable,
}

impl std::fmt::Display for AcceptanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptanceStatus::Queued => write!(f, "queued"),
            AcceptanceStatus::FailedToLoad => write!(f, "failed to load"),
            AcceptanceStatus::Failed => write!(f, "failed"),
            AcceptanceStatus::Undeliverable => write!(f, "undeliverable"),
        }
    }
}

/// Per-recipient outcome of a dispatch, returned before any send happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRecipientResult {
    pub recipient: String,
    pub email: Option<String>,
    /// Present once a ledger row exists for this recipient.
    pub message_id: Option<Uuid>,
    pub status: AcceptanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
