//! Price observations, per-coin history windows and poll snapshots.

use crate::{CoinKey, Direction};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Returns true for prices a provider may legitimately report.
#[inline]
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// A single observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Set when this observation crossed the alert threshold against its
    /// lookback reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossed: Option<Direction>,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            crossed: None,
        }
    }

    pub fn with_crossing(mut self, crossed: Option<Direction>) -> Self {
        self.crossed = crossed;
        self
    }
}

/// Accepts RFC 3339 as well as offset-less ISO-8601 (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}

/// Bounded time series for one coin, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    points: VecDeque<PricePoint>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from points already in chronological order.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// The point exactly `samples` positions back from the end.
    ///
    /// `lookback(1)` is the latest point; `lookback(len)` is the oldest.
    /// Returns None when the history is too short or `samples` is zero.
    pub fn lookback(&self, samples: usize) -> Option<&PricePoint> {
        if samples == 0 || samples > self.points.len() {
            return None;
        }
        self.points.get(self.points.len() - samples)
    }

    /// Append a point and evict from the front until `len <= capacity`.
    /// Returns the number of evicted points.
    pub fn push(&mut self, point: PricePoint, capacity: usize) -> usize {
        self.points.push_back(point);
        self.truncate_front(capacity)
    }

    /// Drop the oldest points so that at most `capacity` remain.
    pub fn truncate_front(&mut self, capacity: usize) -> usize {
        let excess = self.points.len().saturating_sub(capacity);
        self.points.drain(..excess);
        excess
    }
}

/// Per-coin histories keyed by canonical coin key (sorted for stable output).
pub type HistoryMap = BTreeMap<CoinKey, PriceHistory>;

/// Prices gathered in one poll cycle. Possibly partial.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    taken_at: DateTime<Utc>,
    prices: BTreeMap<CoinKey, f64>,
}

impl PriceSnapshot {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            prices: BTreeMap::new(),
        }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Insert a price; invalid prices are rejected and false is returned.
    pub fn insert(&mut self, coin: CoinKey, price: f64) -> bool {
        if !is_valid_price(price) {
            return false;
        }
        self.prices.insert(coin, price);
        true
    }

    pub fn get(&self, coin: &str) -> Option<f64> {
        self.prices.get(coin).copied()
    }

    pub fn contains(&self, coin: &str) -> bool {
        self.prices.contains_key(coin)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CoinKey, f64)> {
        self.prices.iter().map(|(coin, price)| (coin, *price))
    }
}
