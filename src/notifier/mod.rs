//! Notifier - Chat webhook delivery
//!
//! ## Responsibilities
//!
//! - POST MessageCards to the configured webhook
//! - Fixed 5 second timeout, no retry beyond the transport's own
//! - Non-success status is an error for the invocation

mod types;

pub use types::*;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Webhook timeout
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification capability
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, card: &MessageCard) -> Result<()>;
}

/// Incoming-webhook notifier (MessageCard format)
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, card: &MessageCard) -> Result<()> {
        tracing::debug!(title = %card.title, "Posting notification");

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(card)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Webhook request failed");
                Error::Notifier(format!("webhook error: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Webhook returned non-success");
            return Err(Error::Notifier(format!("webhook unreachable: {}", status)));
        }

        Ok(())
    }
}
