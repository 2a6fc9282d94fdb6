//! Alert delivery for price-change events.
//!
//! This crate provides:
//! - The `AlertSink` trait and best-effort fan-out (`notify_all`)
//! - Telegram Bot API delivery
//! - Alert message formatting

pub mod config;
pub mod message;
pub mod notifier;
pub mod telegram;

pub use config::TelegramConfig;
pub use message::format_alert_message;
pub use notifier::{notify_all, AlertSink, DeliveryReport, LogNotifier, NotifyError};
pub use telegram::TelegramNotifier;
