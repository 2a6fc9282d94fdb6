//! Threshold-crossing alert events.

use crate::CoinKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Up for strictly positive changes, down otherwise.
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coin whose price moved past the alert threshold within the lookback
/// window. Produced once per coin per cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub coin: CoinKey,
    pub direction: Direction,
    /// Signed fractional change, `(current - reference) / reference`.
    pub percent_change: f64,
    pub reference_price: f64,
    pub current_price: f64,
    /// Seconds between the reference observation and the current one.
    pub window_seconds: i64,
    /// Number of samples looked back.
    pub lookback_samples: usize,
}

impl AlertEvent {
    /// Change expressed in percent (0.06 -> 6.0).
    #[inline]
    pub fn percent(&self) -> f64 {
        self.percent_change * 100.0
    }
}
