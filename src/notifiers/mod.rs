pub mod discord;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

use crate::config::NotificationsConfig;
use crate::models::{DeliveryCode, ProductIdentity};
use crate::utils::error::{AppError, Result};

pub use discord::DiscordNotifier;

/// A delivery code resolved to `Available`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityEvent {
    pub url: String,
    pub product: ProductIdentity,
    pub code: DeliveryCode,
    pub detected_at: DateTime<Local>,
}

impl AvailabilityEvent {
    pub fn new(url: impl Into<String>, product: ProductIdentity, code: DeliveryCode) -> Self {
        Self {
            url: url.into(),
            product,
            code,
            detected_at: Local::now(),
        }
    }
}

/// Fire-and-forget alert channel. Implementations must return quickly and
/// must never block resolution on slow delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &AvailabilityEvent) -> Result<()>;
}

/// Fans one event out to every configured notifier.
#[derive(Clone, Default)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut set = Self::new();
        if config.bell {
            set.push(Arc::new(BellNotifier));
        }
        if let Some(command) = &config.sound_command {
            set.push(Arc::new(CommandNotifier::new(command.clone())));
        }
        if let Some(webhook_url) = &config.discord_webhook_url {
            set.push(Arc::new(DiscordNotifier::new(
                webhook_url.clone(),
                config.discord_username.clone(),
            )));
        }
        set
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    fn name(&self) -> &str {
        "set"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<()> {
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(event).await {
                tracing::warn!(notifier = notifier.name(), error = %e, "Notification failed");
            }
        }
        Ok(())
    }
}

/// Rings the terminal bell.
pub struct BellNotifier;

#[async_trait]
impl Notifier for BellNotifier {
    fn name(&self) -> &str {
        "bell"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        tracing::debug!(code = %event.code, "Bell rung");
        Ok(())
    }
}

/// Runs a shell command, e.g. `paplay notification.wav`, without waiting for it.
pub struct CommandNotifier {
    command: String,
}

impl CommandNotifier {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    fn name(&self) -> &str {
        "command"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> Result<()> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("STOCKWATCH_PRODUCT", &event.product.name)
            .env("STOCKWATCH_CODE", event.code.as_str())
            .env("STOCKWATCH_URL", &event.url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| AppError::Notifier {
                notifier: "command".to_string(),
                message: format!("failed to spawn `{}`: {}", self.command, e),
            })?;

        let command = self.command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!(command = %command, %status, "Sound command exited unsuccessfully");
                }
                Err(e) => tracing::warn!(command = %command, error = %e, "Sound command failed"),
                _ => {}
            }
        });
        Ok(())
    }
}
