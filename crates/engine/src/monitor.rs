//! Run controller: one cycle is load, poll, evaluate, notify, save.

use crate::detector::{ChangeDetector, DetectorConfig};
use crate::error::MonitorError;
use crate::history::HistoryStore;
use pricewatch_alerts::{notify_all, AlertSink};
use pricewatch_core::{AlertEvent, CoinKey, HistoryMap, PricePoint, PriceSnapshot, Provider};
use pricewatch_feeds::{FetchOrchestrator, ProviderOutcome};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Settings for a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub detector: DetectorConfig,
    pub history_path: PathBuf,
    /// Coins polled every cycle, in shard order.
    pub coins: Vec<CoinKey>,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub polled: usize,
    pub priced: usize,
    pub alerts: usize,
    pub delivered: usize,
    pub failed_notifications: usize,
    pub providers: Vec<(Provider, ProviderOutcome)>,
}

pub struct Monitor {
    coins: Vec<CoinKey>,
    orchestrator: FetchOrchestrator,
    store: HistoryStore,
    detector: ChangeDetector,
    notifier: Arc<dyn AlertSink>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        orchestrator: FetchOrchestrator,
        notifier: Arc<dyn AlertSink>,
    ) -> Result<Self, MonitorError> {
        if config.coins.is_empty() {
            return Err(MonitorError::Config("no coins to monitor".to_string()));
        }
        if orchestrator.providers().is_empty() {
            return Err(MonitorError::Config("no providers configured".to_string()));
        }
        if config.detector.window_size == 0 {
            return Err(MonitorError::Config("window size must be at least 1".to_string()));
        }

        Ok(Self {
            coins: config.coins,
            orchestrator,
            store: HistoryStore::new(config.history_path, config.detector.window_size),
            detector: ChangeDetector::new(config.detector),
            notifier,
        })
    }

    pub fn coins(&self) -> &[CoinKey] {
        &self.coins
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Evaluate every priced coin against its history, then append the new
    /// point and evict beyond the window.
    ///
    /// A crossing is alerted once: while consecutive observations keep
    /// crossing in the same direction only the first one produces an event.
    pub fn apply_snapshot(
        &self,
        snapshot: &PriceSnapshot,
        histories: &mut HistoryMap,
    ) -> Vec<AlertEvent> {
        let observed_at = snapshot.taken_at();
        let capacity = self.detector.config().window_size;
        let mut alerts = Vec::new();

        for (coin, price) in snapshot.iter() {
            let point = PricePoint::new(observed_at, price);
            let history = histories.entry(coin.clone()).or_default();
            let crossing = self.detector.evaluate(coin, &point, history);
            let crossed = crossing.as_ref().map(|alert| alert.direction);

            if let Some(alert) = crossing {
                let previous = history.latest().and_then(|p| p.crossed);
                if previous == Some(alert.direction) {
                    debug!(
                        coin = %coin,
                        direction = %alert.direction,
                        "Crossing already alerted"
                    );
                } else {
                    info!(
                        coin = %coin,
                        direction = %alert.direction,
                        percent = alert.percent(),
                        "Threshold crossed"
                    );
                    alerts.push(alert);
                }
            }
            history.push(point.with_crossing(crossed), capacity);
        }

        alerts
    }

    /// Run one full cycle.
    ///
    /// Fails only on history errors; provider and notification failures are
    /// reflected in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, MonitorError> {
        let mut histories = self.store.load()?;

        let poll = self.orchestrator.poll(&self.coins).await;
        for (provider, outcome) in &poll.outcomes {
            if outcome.is_success() {
                info!(provider = %provider, outcome = %outcome, "Provider result");
            } else {
                warn!(provider = %provider, outcome = %outcome, "Provider result");
            }
        }

        let alerts = self.apply_snapshot(&poll.snapshot, &mut histories);
        let delivery = notify_all(self.notifier.as_ref(), &alerts).await;

        if poll.snapshot.is_empty() {
            warn!("No prices received this cycle, history left unchanged");
        } else {
            self.store.save(&histories)?;
        }

        Ok(CycleReport {
            polled: self.coins.len(),
            priced: poll.snapshot.len(),
            alerts: alerts.len(),
            delivered: delivery.delivered,
            failed_notifications: delivery.failed,
            providers: poll.outcomes,
        })
    }

    /// Run cycles on a fixed interval until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. A slow cycle delays the next
    /// tick instead of bunching them up. Non-fatal errors are logged and the
    /// loop continues; a fatal one is returned.
    pub async fn run<F>(&self, interval: Duration, shutdown: F) -> Result<(), MonitorError>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            coins = self.coins.len(),
            interval_secs = interval.as_secs(),
            "Starting monitor loop"
        );

        let mut cycle: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(cycles = cycle, "Shutdown requested, stopping monitor");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            cycle += 1;
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        cycle,
                        polled = report.polled,
                        priced = report.priced,
                        alerts = report.alerts,
                        delivered = report.delivered,
                        failed = report.failed_notifications,
                        "Cycle complete"
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!(cycle, error = %e, "Fatal error, stopping monitor");
                    return Err(e);
                }
                Err(e) => {
                    error!(cycle, error = %e, "Cycle failed, will retry next interval");
                }
            }
        }
    }
}
