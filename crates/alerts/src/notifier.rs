//! Alert notification logic.

use crate::message::format_alert_message;
use async_trait::async_trait;
use pricewatch_core::AlertEvent;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    /// Carries no URL: the Bot API path embeds the token.
    #[error("Request failed: {0}")]
    Transport(reqwest::Error),
    #[error("Rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for alert events. Delivery is best-effort: callers log
/// failures and move on, nothing is retried.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one message for one event.
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

/// Sink that only writes alerts to the log. Used when no outbound channel
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AlertSink for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        info!(
            coin = %event.coin,
            direction = %event.direction,
            "{}",
            format_alert_message(event)
        );
        Ok(())
    }
}

/// Counts from one round of deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Send every event through `sink`, one message each, in order. A failed
/// delivery is logged with the coin and does not stop the remaining ones.
pub async fn notify_all(sink: &dyn AlertSink, events: &[AlertEvent]) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for event in events {
        match sink.notify(event).await {
            Ok(()) => {
                info!(
                    sink = sink.name(),
                    coin = %event.coin,
                    percent = event.percent(),
                    "Alert sent"
                );
                report.delivered += 1;
            }
            Err(e) => {
                error!(
                    sink = sink.name(),
                    coin = %event.coin,
                    error = %e,
                    "Failed to send alert"
                );
                report.failed += 1;
            }
        }
    }

    report
}
