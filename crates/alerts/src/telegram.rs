//! Telegram Bot API delivery.

use crate::config::TelegramConfig;
use crate::message::format_alert_message;
use crate::notifier::{AlertSink, NotifyError};
use async_trait::async_trait;
use pricewatch_core::AlertEvent;
use tracing::warn;

/// Sends one `sendMessage` call per alert.
pub struct TelegramNotifier {
    config: TelegramConfig,
    http_client: reqwest::Client,
    api_base: String,
}

impl TelegramNotifier {
    const API_BASE: &'static str = "https://api.telegram.org";

    /// Create a new notifier.
    pub fn new(config: TelegramConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            api_base: Self::API_BASE.to_string(),
        }
    }

    /// Override the Bot API root (local Bot API server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Send a message via Telegram Bot API.
    pub async fn send_message(&self, message: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.config.bot_token);

        let params = [
            ("chat_id", self.config.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true"),
        ];

        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Telegram API returned non-success status: {}", status);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.send_message(&format_alert_message(event)).await
    }
}
