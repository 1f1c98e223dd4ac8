//! Collaborator interfaces for generation, delivery, and alerting.
//!
//! The pipeline core only sees these traits; concrete transports
//! (subprocess generator, webhook delivery, webhook alert) are swappable.

pub mod command;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Brief, PipelineContext, RenderedBrief};

// Re-export concrete adapters
pub use command::CommandGenerator;
pub use webhook::{WebhookAlert, WebhookSink};

/// Who receives the delivered brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub address: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Classified delivery failure.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Credentials rejected; retrying will not help
    #[error("delivery auth failure: {0}")]
    Auth(String),

    /// Network-level failure; one retry is allowed after a cooldown
    #[error("delivery transient failure: {0}")]
    Transient(String),
}

/// Minimal failure descriptor sent through the alert channel.
#[derive(Debug, Clone, Serialize)]
pub struct FailureNotice {
    pub stage: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureNotice {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Plain-text rendering for the low-dependency alert path.
    pub fn render(&self) -> String {
        format!(
            "[PIPELINE FAILED] stage={} at {}\n{}",
            self.stage,
            self.timestamp.format("%Y-%m-%d %H:%M UTC"),
            self.reason
        )
    }
}

/// Generation collaborator: turns the resolved pipeline context into a
/// populated brief matching the fixed output schema.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    async fn generate(&self, context: &PipelineContext) -> Result<Brief>;
}

/// Delivery collaborator: sends rendered content to a recipient.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Human-readable sink name
    fn name(&self) -> &str;

    async fn deliver(
        &self,
        content: &RenderedBrief,
        recipient: &Recipient,
    ) -> Result<(), DeliveryError>;
}

/// Alert channel: reports a critical failure over a path with strictly
/// fewer dependencies than delivery. Its own failure is logged, never
/// escalated.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn dispatch(&self, notice: &FailureNotice) -> Result<()>;
}
