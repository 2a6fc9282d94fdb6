//! Alert channel configuration.

use serde::{Deserialize, Serialize};

/// Telegram bot credentials and target chat.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// Chat (user, group or channel) receiving alerts
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Both token and chat id are present.
    pub fn is_complete(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }

    /// Chat id prefix safe to put in logs.
    pub fn chat_id_hint(&self) -> &str {
        let end = self
            .chat_id
            .char_indices()
            .nth(6)
            .map_or(self.chat_id.len(), |(i, _)| i);
        &self.chat_id[..end]
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_config_complete() {
        assert!(TelegramConfig::new("123:abc", "-100200").is_complete());
        assert!(!TelegramConfig::new("123:abc", " ").is_complete());
        assert!(!TelegramConfig::default().is_complete());
    }

    #[test]
    fn test_telegram_config_debug_redacts_token() {
        let config = TelegramConfig::new("123:secret", "42");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("42"));
    }

    #[test]
    fn test_chat_id_hint() {
        assert_eq!(TelegramConfig::new("t", "-1001234567").chat_id_hint(), "-10012");
        assert_eq!(TelegramConfig::new("t", "42").chat_id_hint(), "42");
    }
}
