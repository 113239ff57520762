//! Courier: turns one dispatch request into per-recipient delivery jobs.
//!
//! Steps:
//! 1. Obtain an access token (failure aborts the dispatch)
//! 2. Resolve the audience (failure aborts the dispatch)
//! 3. Fill in missing email addresses via the user-info loader
//! 4. Load the template once and render it per recipient
//! 5. Create the ledger row, then enqueue the job
//!
//! Everything after step 2 fails per recipient and is reported in the result.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herald_common::types::{
    AcceptanceStatus, DeliveryJob, MessageStatus, PerRecipientResult, Recipient, Template,
};

use crate::error::{DispatchError, LoaderError};
use crate::ledger::MessageLedger;
use crate::loaders::Loaders;
use crate::queue::DeliveryQueue;
use crate::strategy::Audience;
use crate::template::{self, Variables};

/// One notification to send to an audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub client_id: String,
    pub kind_id: String,
    pub audience: Audience,
    pub subject: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

pub struct Courier {
    loaders: Loaders,
    ledger: Arc<dyn MessageLedger>,
    queue: Arc<DeliveryQueue>,
}

impl Courier {
    pub fn new(
        loaders: Loaders,
        ledger: Arc<dyn MessageLedger>,
        queue: Arc<DeliveryQueue>,
    ) -> Self {
        Self {
            loaders,
            ledger,
            queue,
        }
    }

    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<Vec<PerRecipientResult>, DispatchError> {
        let token = self
            .loaders
            .tokens
            .load()
            .await
            .map_err(DispatchError::Authentication)?;

        let recipients = request
            .audience
            .resolve(self.loaders.members.as_ref(), &token)
            .await
            .map_err(DispatchError::AudienceResolution)?;

        if recipients.is_empty() {
            tracing::info!(
                client_id = %request.client_id,
                scope = request.audience.scope_name(),
                "Audience is empty, nothing to dispatch"
            );
            return Ok(Vec::new());
        }

        let template = self
            .loaders
            .templates
            .load(&request.client_id, &request.kind_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    client_id = %request.client_id,
                    kind_id = %request.kind_id,
                    error = %e,
                    "Template could not be loaded"
                );
                format!("template unavailable: {}", e)
            });

        let endorsement = request.audience.endorsement();
        let mut results = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let result = self
                .deliver_to(request, &template, &endorsement, &token, recipient)
                .await;
            results.push(result);
        }

        let queued = results
            .iter()
            .filter(|r| r.status == AcceptanceStatus::Queued)
            .count();
        tracing::info!(
            client_id = %request.client_id,
            kind_id = %request.kind_id,
            scope = request.audience.scope_name(),
            recipients = results.len(),
            queued,
            "Dispatch accepted"
        );

        Ok(results)
    }

    async fn deliver_to(
        &self,
        request: &DispatchRequest,
        template: &Result<Template, String>,
        endorsement: &str,
        token: &str,
        recipient: Recipient,
    ) -> PerRecipientResult {
        let recipient = match self.enrich(recipient, token).await {
            Ok(recipient) => recipient,
            Err(outcome) => return outcome,
        };

        // Enrichment guarantees an address from here on.
        let to = recipient.resolved_email().unwrap_or_default().to_string();

        let template = match template {
            Ok(template) => template,
            Err(reason) => {
                return rejected(&recipient, AcceptanceStatus::Failed, reason.clone());
            }
        };

        let message_id = Uuid::new_v4();
        let message_id_str = message_id.to_string();
        let vars = Variables {
            subject: &request.subject,
            text: &request.text,
            html: &request.html,
            to: &to,
            user_guid: recipient.user_guid(),
            client_id: &request.client_id,
            kind_id: &request.kind_id,
            message_id: &message_id_str,
            endorsement,
        };

        let rendered = match template::render(template, &vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(recipient = recipient.identifier(), error = %e, "Render failed");
                return rejected(&recipient, AcceptanceStatus::Failed, e.to_string());
            }
        };

        if let Err(e) = self.ledger.create(message_id, recipient.identifier()).await {
            tracing::error!(message_id = %message_id, error = %e, "Failed to create ledger row");
            return rejected(&recipient, AcceptanceStatus::Failed, e.to_string());
        }

        let job = DeliveryJob {
            message_id,
            to: to.clone(),
            subject: rendered.subject,
            text: rendered.text,
            html: rendered.html,
            client_id: request.client_id.clone(),
            kind_id: request.kind_id.clone(),
            reply_to: request.reply_to.clone(),
            created_at: Utc::now(),
        };

        let (status, reason) = match self.queue.enqueue(job).await {
            Ok(()) => (AcceptanceStatus::Queued, None),
            Err(e) => {
                let reason = e.to_string();
                if let Err(le) = self
                    .ledger
                    .update_status(message_id, MessageStatus::Failed, Some(&reason))
                    .await
                {
                    tracing::error!(
                        message_id = %message_id,
                        error = %le,
                        "Failed to mark unqueued message as failed"
                    );
                }
                (AcceptanceStatus::Failed, Some(reason))
            }
        };

        PerRecipientResult {
            recipient: recipient.identifier().to_string(),
            email: Some(to),
            message_id: Some(message_id),
            status,
            reason,
        }
    }

    /// Resolve the email for GUID recipients. On failure returns the result to
    /// report for this recipient.
    async fn enrich(
        &self,
        recipient: Recipient,
        token: &str,
    ) -> Result<Recipient, PerRecipientResult> {
        if recipient.resolved_email().is_some() {
            return Ok(recipient);
        }
        let Some(guid) = recipient.user_guid().map(str::to_string) else {
            return Ok(recipient);
        };

        match self.loaders.users.load(&guid, token).await {
            Ok(info) => match info.email {
                Some(email) => Ok(recipient.with_email(email)),
                None => {
                    tracing::info!(user_guid = %guid, "User has no email address");
                    Err(rejected(
                        &recipient,
                        AcceptanceStatus::Undeliverable,
                        "user has no email address".to_string(),
                    ))
                }
            },
            Err(e) => {
                tracing::warn!(user_guid = %guid, error = %e, "Failed to load user info");
                let reason = match e {
                    LoaderError::NotFound(_) => "user not found".to_string(),
                    other => other.to_string(),
                };
                Err(rejected(&recipient, AcceptanceStatus::FailedToLoad, reason))
            }
        }
    }
}

/// Result for a recipient rejected before any ledger row exists.
fn rejected(recipient: &Recipient, status: AcceptanceStatus, reason: String) -> PerRecipientResult {
    PerRecipientResult {
        recipient: recipient.identifier().to_string(),
        email: recipient.resolved_email().map(str::to_string),
        message_id: None,
        status,
        reason: Some(reason),
    }
}
