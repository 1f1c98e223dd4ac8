//! Webhook clients for delivery and alerting.
//!
//! `WebhookSink` posts the rendered brief as JSON to the delivery endpoint.
//! `WebhookAlert` posts a bare plain-text body: no schema, no rendering, no
//! recipient routing, so the path most likely to still work is the one used
//! to report that something broke.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::domain::RenderedBrief;

use super::{AlertChannel, DeliveryError, DeliverySink, FailureNotice, Recipient};

/// Delivery sink posting JSON to a webhook endpoint.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(
        &self,
        content: &RenderedBrief,
        recipient: &Recipient,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "subject": content.subject,
                "body": content.body,
                "recipient_name": recipient.name,
                "recipient_address": recipient.address,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(format!("delivery request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DeliveryError::Auth(format!(
                "delivery endpoint rejected credentials: {status}"
            )));
        }
        if !status.is_success() {
            return Err(DeliveryError::Transient(format!(
                "delivery endpoint returned {status}"
            )));
        }

        Ok(())
    }
}

/// Alert channel posting plain text to a webhook endpoint.
pub struct WebhookAlert {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlert {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookAlert {
    async fn dispatch(&self, notice: &FailureNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "text/plain")
            .body(notice.render())
            .send()
            .await
            .context("Failed to send failure alert")?;

        if !response.status().is_success() {
            anyhow::bail!("Alert endpoint returned {}", response.status());
        }

        Ok(())
    }
}
