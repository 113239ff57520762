//! Mail transport seam and its SMTP implementation.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use herald_common::config::{AppConfig, SmtpTls};
use herald_common::types::DeliveryJob;

use crate::error::SendError;

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send one rendered job. Errors must say whether a retry could succeed.
    async fn send(&self, job: &DeliveryJob) -> Result<(), SendError>;
}

/// SMTP delivery through `lettre`'s async tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let builder = match config.smtp_tls {
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            }
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        }
        .port(config.smtp_port);

        let builder = match (&config.smtp_user, &config.smtp_password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e| {
            anyhow::anyhow!("SENDER '{}' is not a valid address: {}", config.sender, e)
        })?;

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = ?config.smtp_tls,
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn build_message(from: &Mailbox, job: &DeliveryJob) -> Result<lettre::Message, SendError> {
    let to: Mailbox = job.to.parse().map_err(|e| {
        SendError::Permanent(format!("invalid recipient address '{}': {}", job.to, e))
    })?;

    let mut builder = lettre::Message::builder()
        .from(from.clone())
        .to(to)
        .subject(job.subject.clone())
        .message_id(Some(format!(
            "<{}@{}>",
            job.message_id,
            from.email.domain()
        )));

    if let Some(reply_to) = &job.reply_to {
        match reply_to.parse::<Mailbox>() {
            Ok(mailbox) => builder = builder.reply_to(mailbox),
            Err(e) => tracing::warn!(
                message_id = %job.message_id,
                reply_to = %reply_to,
                error = %e,
                "Ignoring invalid reply-to address"
            ),
        }
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            job.text.clone(),
            job.html.clone(),
        ))
        .map_err(|e| SendError::Permanent(format!("failed to build message: {}", e)))
}

/// Only a 5xx reply from the relay is permanent. Relay capability mismatches
/// (no STARTTLS, no usable auth mechanism) surface as client errors and stay
/// transient, along with connection, TLS, timeout and 4xx failures.
fn classify(error: lettre::transport::smtp::Error) -> SendError {
    if error.is_permanent() {
        SendError::Permanent(error.to_string())
    } else {
        SendError::Transient(error.to_string())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, job: &DeliveryJob) -> Result<(), SendError> {
        let message = build_message(&self.from, job)?;
        self.transport.send(message).await.map_err(classify)?;

        tracing::debug!(message_id = %job.message_id, to = %job.to, "SMTP send accepted");
        Ok(())
    }
}
