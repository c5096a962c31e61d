//! Discord webhook sink: treated purely as an external chat sink (spec
//! §1 lists Discord webhook transport as out of scope beyond this
//! interface). Retries delivery failures with exponential backoff (3
//! attempts, cap 10s) via `reqwest-middleware`/`reqwest-retry`, the same
//! stack the teacher uses for its own HTTP clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;

use crate::domain::alert::Alert;
use crate::domain::errors::AlertError;
use crate::infrastructure::sinks::ChatSink;

pub struct DiscordWebhookSink {
    channel_name: String,
    webhook_url: String,
    client: reqwest_middleware::ClientWithMiddleware,
}

impl DiscordWebhookSink {
    pub fn new(channel_name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(250), Duration::from_secs(10))
            .build_with_max_retries(3);
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with static config");
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        DiscordWebhookSink {
            channel_name: channel_name.into(),
            webhook_url: webhook_url.into(),
            client,
        }
    }

    fn render(alert: &Alert) -> serde_json::Value {
        json!({
            "content": format!(
                "[{}] {} — {} ({})",
                alert.priority.as_str(),
                alert.symbol,
                alert.message,
                alert.subtype.as_str(),
            ),
        })
    }
}

#[async_trait]
impl ChatSink for DiscordWebhookSink {
    fn channel_name(&self) -> &str {
        &self.channel_name
    }

    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let body = Self::render(alert);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AlertError::DeliveryFailed {
                channel: self.channel_name.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() && response.status().as_u16() != 429 {
            return Err(AlertError::DeliveryFailed {
                channel: self.channel_name.clone(),
                reason: format!("discord returned {}", response.status()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertPayload, AlertSubtype, AlertType, Priority};

    #[test]
    fn render_includes_priority_and_symbol() {
        let alert = Alert {
            id: 1,
            symbol: "NVDA".to_string(),
            alert_type: AlertType::Stop,
            subtype: AlertSubtype::HardStop,
            position_id: Some(1),
            payload: AlertPayload::default(),
            message: "hit hard stop".to_string(),
            action: None,
            thread_source: "position".to_string(),
            priority: Priority::P0,
            created_at: chrono::Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        };
        let rendered = DiscordWebhookSink::render(&alert);
        let content = rendered["content"].as_str().unwrap();
        assert!(content.contains("P0"));
        assert!(content.contains("NVDA"));
    }
}
