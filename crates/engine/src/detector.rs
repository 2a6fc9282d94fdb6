//! Threshold-crossing change detection.

use pricewatch_core::{is_valid_price, AlertEvent, CoinKey, Direction, PriceHistory, PricePoint};

/// Configuration for the change detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Minimum absolute fractional change that triggers an alert (0.05 = 5%).
    pub threshold: f64,
    /// Lookback distance in samples; also the number of points retained
    /// per coin.
    pub window_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            window_size: 3,
        }
    }
}

/// Compares fresh prices against the retained window.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: DetectorConfig,
}

impl ChangeDetector {
    /// Create a new detector with the given configuration.
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate one coin. `history` must not yet contain `current`.
    pub fn evaluate(
        &self,
        coin: &CoinKey,
        current: &PricePoint,
        history: &PriceHistory,
    ) -> Option<AlertEvent> {
        evaluate(
            coin,
            current,
            history,
            self.config.threshold,
            self.config.window_size,
        )
    }
}

/// Compare `current` against the point exactly `window_size` samples back.
///
/// No alert while the history is shorter than the window (cold start) or
/// when the reference price is unusable. Pure: the same inputs always give
/// the same decision.
pub fn evaluate(
    coin: &CoinKey,
    current: &PricePoint,
    history: &PriceHistory,
    threshold: f64,
    window_size: usize,
) -> Option<AlertEvent> {
    let reference = history.lookback(window_size)?;
    if !is_valid_price(reference.price) || !is_valid_price(current.price) {
        return None;
    }

    let change = (current.price - reference.price) / reference.price;
    if !change.is_finite() || change.abs() < threshold {
        return None;
    }

    Some(AlertEvent {
        coin: coin.clone(),
        direction: Direction::from_change(change),
        percent_change: change,
        reference_price: reference.price,
        current_price: current.price,
        window_seconds: (current.timestamp - reference.timestamp).num_seconds(),
        lookback_samples: window_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn history(prices: &[f64]) -> PriceHistory {
        PriceHistory::from_points(
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| PricePoint::new(t0() + Duration::minutes(5 * i as i64), p)),
        )
    }

    fn now(prices: &[f64], price: f64) -> PricePoint {
        PricePoint::new(t0() + Duration::minutes(5 * prices.len() as i64), price)
    }

    fn detector() -> ChangeDetector {
        ChangeDetector::new(DetectorConfig {
            threshold: 0.05,
            window_size: 3,
        })
    }

    #[test]
    fn test_alert_up_when_threshold_crossed() {
        let prices = [100.0, 100.0, 100.0];
        let coin = CoinKey::new("bitcoin");
        let alert = detector()
            .evaluate(&coin, &now(&prices, 106.0), &history(&prices))
            .expect("alert");

        assert_eq!(alert.direction, Direction::Up);
        assert_eq!(format!("{:.2}", alert.percent()), "6.00");
        assert_eq!(alert.reference_price, 100.0);
        assert_eq!(alert.current_price, 106.0);
        assert_eq!(alert.window_seconds, 15 * 60);
        assert_eq!(alert.lookback_samples, 3);
    }

    #[test]
    fn test_no_alert_below_threshold() {
        let prices = [100.0, 100.0, 100.0];
        let coin = CoinKey::new("bitcoin");
        assert!(detector()
            .evaluate(&coin, &now(&prices, 104.0), &history(&prices))
            .is_none());
    }

    #[test]
    fn test_alert_at_exact_threshold() {
        let prices = [100.0, 100.0, 100.0];
        let coin = CoinKey::new("bitcoin");
        assert!(detector()
            .evaluate(&coin, &now(&prices, 105.0), &history(&prices))
            .is_some());
    }

    #[test]
    fn test_alert_down() {
        let prices = [200.0, 150.0, 190.0];
        let coin = CoinKey::new("ethereum");
        let alert = detector()
            .evaluate(&coin, &now(&prices, 180.0), &history(&prices))
            .expect("alert");
        assert_eq!(alert.direction, Direction::Down);
        assert!((alert.percent_change + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_compares_exactly_window_size_back() {
        // Oldest point would trigger, the 3-back point would not.
        let prices = [50.0, 100.0, 100.0, 100.0];
        let coin = CoinKey::new("solana");
        assert!(detector()
            .evaluate(&coin, &now(&prices, 103.0), &history(&prices))
            .is_none());
    }

    #[test]
    fn test_cold_start_never_alerts() {
        let coin = CoinKey::new("new-coin");
        for prices in [&[][..], &[1.0][..], &[1.0, 1.0][..]] {
            assert!(detector()
                .evaluate(&coin, &now(prices, 1000.0), &history(prices))
                .is_none());
        }
    }

    #[test]
    fn test_unusable_reference_price() {
        let prices = [0.0, 100.0, 100.0];
        let coin = CoinKey::new("broken");
        assert!(detector()
            .evaluate(&coin, &now(&prices, 106.0), &history(&prices))
            .is_none());
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let prices = [100.0, 101.0, 99.0];
        let hist = history(&prices);
        let coin = CoinKey::new("bitcoin");
        for price in [90.0, 100.0, 110.0] {
            let point = now(&prices, price);
            let first = detector().evaluate(&coin, &point, &hist);
            let second = detector().evaluate(&coin, &point, &hist);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_window_of_one_compares_with_latest() {
        let prices = [100.0, 200.0];
        let coin = CoinKey::new("bitcoin");
        let alert = evaluate(&coin, &now(&prices, 210.0), &history(&prices), 0.05, 1)
            .expect("alert");
        assert_eq!(alert.reference_price, 200.0);
    }
}
