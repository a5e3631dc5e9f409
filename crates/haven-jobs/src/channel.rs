//! # Channel Senders
//!
//! Outbound delivery adapters behind an object-safe trait. The drain worker
//! only sees [`ChannelSender`]; SMTP and the SMS gateway live here.
//!
//! Send failures are classified, not just reported: a transient failure
//! (connection refused, 5xx, timeout) earns a retry with backoff, while a
//! permanent one (rejected address, 4xx) fails the item immediately.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use tracing::debug;

use haven_core::{Channel, NotificationQueueItem};

use crate::render::RenderedNotification;

// =============================================================================
// Errors
// =============================================================================

/// A delivery failure, classified for retry handling.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Worth retrying: network trouble, provider 5xx, timeouts.
    #[error("transient send failure: {0}")]
    Transient(String),

    /// Not worth retrying: bad address, provider rejected the request.
    #[error("permanent send failure: {0}")]
    Permanent(String),
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }
}

// =============================================================================
// Sender Trait
// =============================================================================

/// An outbound delivery channel. One implementation per [`Channel`].
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Which channel this sender serves.
    fn channel(&self) -> Channel;

    /// Delivers one rendered notification to the item's recipient address.
    ///
    /// Callers guarantee `item.recipient_address` is present.
    async fn send(
        &self,
        item: &NotificationQueueItem,
        rendered: &RenderedNotification,
    ) -> Result<(), ChannelError>;
}

// =============================================================================
// Email (SMTP)
// =============================================================================

/// SMTP connection settings for outbound email.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Global fallback sender, used when a company has no sender_email.
    pub from_address: String,
    pub from_name: String,
}

/// Email delivery over async SMTP.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    from_name: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, ChannelError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| ChannelError::Permanent(format!("invalid SMTP relay host: {e}")))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(SmtpEmailSender {
            transport: builder.build(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl ChannelSender for SmtpEmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(
        &self,
        item: &NotificationQueueItem,
        rendered: &RenderedNotification,
    ) -> Result<(), ChannelError> {
        let to = item
            .recipient_address
            .as_deref()
            .ok_or_else(|| ChannelError::Permanent("queue item has no email address".into()))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| ChannelError::Permanent(format!("invalid recipient address {to}: {e}")))?;
        let from_mailbox: Mailbox = format!("{} <{}>", self.from_name, self.from_address)
            .parse()
            .map_err(|e| ChannelError::Permanent(format!("invalid sender address: {e}")))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&rendered.subject)
            .body(rendered.body.clone())
            .map_err(|e| ChannelError::Permanent(format!("failed to build message: {e}")))?;

        debug!(item_id = %item.id, to = %to, "sending email");

        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            // SMTP permanent errors (5xx reply codes) mean the recipient or
            // message was rejected; everything else is connection trouble.
            Err(e) if e.is_permanent() => Err(ChannelError::Permanent(e.to_string())),
            Err(e) => Err(ChannelError::Transient(e.to_string())),
        }
    }
}

// =============================================================================
// SMS (HTTP gateway)
// =============================================================================

/// SMS gateway settings. The gateway takes a JSON POST per message.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub api_key: String,
}

/// SMS delivery through an HTTP gateway.
pub struct HttpSmsSender {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
}

impl HttpSmsSender {
    pub fn new(config: &SmsConfig) -> Self {
        HttpSmsSender {
            client: reqwest::Client::new(),
            gateway_url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ChannelSender for HttpSmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(
        &self,
        item: &NotificationQueueItem,
        rendered: &RenderedNotification,
    ) -> Result<(), ChannelError> {
        let to = item
            .recipient_address
            .as_deref()
            .ok_or_else(|| ChannelError::Permanent("queue item has no phone number".into()))?;

        debug!(item_id = %item.id, to = %to, "sending SMS");

        let response = self
            .client
            .post(&self.gateway_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "to": to,
                "body": rendered.body,
            }))
            .send()
            .await
            .map_err(|e| {
                // Connect/timeout errors never reached the gateway
                ChannelError::Transient(format!("SMS gateway unreachable: {e}"))
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(ChannelError::Transient(format!(
                "SMS gateway returned {status}"
            )))
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(ChannelError::Permanent(format!(
                "SMS gateway rejected message ({status}): {detail}"
            )))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ChannelError::Transient("timeout".into()).is_transient());
        assert!(!ChannelError::Permanent("bad address".into()).is_transient());
    }

    #[test]
    fn test_smtp_sender_rejects_bad_relay_host() {
        let config = SmtpConfig {
            host: "not a host name".into(),
            port: 587,
            username: None,
            password: None,
            from_address: "noreply@example.com".into(),
            from_name: "Haven PMS".into(),
        };
        assert!(SmtpEmailSender::new(&config).is_err());
    }
}
