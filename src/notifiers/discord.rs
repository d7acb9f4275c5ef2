use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{AvailabilityEvent, Notifier};
use crate::utils::error::{AppError, Result};

const AVAILABLE_COLOR: u32 = 0x00ff00;

/// Posts an embed to a Discord webhook. Delivery runs on a spawned task.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String, username: String) -> Self {
        DiscordNotifier {
            client: Client::new(),
            webhook_url,
            username,
        }
    }

    fn create_embed(&self, event: &AvailabilityEvent) -> serde_json::Value {
        json!({
            "title": format!("✅ {}", event.product.name),
            "url": event.url,
            "color": AVAILABLE_COLOR,
            "timestamp": event.detected_at.to_rfc3339(),
            "fields": [
                {
                    "name": "📦 Deliverable to",
                    "value": event.code.as_str(),
                    "inline": true
                },
                {
                    "name": "💰 Price",
                    "value": event.product.price,
                    "inline": true
                }
            ],
            "footer": { "text": "Stock Watcher" }
        })
    }

    fn create_payload(&self, event: &AvailabilityEvent) -> serde_json::Value {
        json!({
            "username": self.username,
            "content": format!("{} is available for {}", event.product.name, event.code),
            "embeds": [self.create_embed(event)]
        })
    }

    /// Sends the webhook request and waits for Discord's answer.
    pub async fn send(&self, event: &AvailabilityEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_payload(event))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Notifier {
                notifier: "discord".to_string(),
                message: format!("HTTP {}: {}", status, error_text),
            })
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<()> {
        let notifier = self.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&event).await {
                tracing::warn!(code = %event.code, error = %e, "Discord notification failed");
            }
        });
        Ok(())
    }
}
