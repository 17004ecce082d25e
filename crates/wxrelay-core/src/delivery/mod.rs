//! Outbound chat notifications.

pub mod format;
pub mod webhook;

pub use format::MessageFormatter;
pub use webhook::WebhookChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    pub text: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
}

/// Incoming-webhook payload: a headline plus attachments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// The channel's own verdict on a message it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryAck {
    #[serde(default)]
    pub success: bool,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<DeliveryAck, DeliveryError>;
}
