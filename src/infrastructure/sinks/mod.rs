//! Chat sink abstraction: the delivery target for routed alerts.

pub mod discord_webhook;

pub use discord_webhook::DiscordWebhookSink;

use async_trait::async_trait;

use crate::domain::alert::Alert;
use crate::domain::errors::AlertError;

#[async_trait]
pub trait ChatSink: Send + Sync {
    fn channel_name(&self) -> &str;
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;
}
