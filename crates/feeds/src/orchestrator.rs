//! Fetch orchestration across provider adapters.
//!
//! The coin universe is sharded by position across the configured adapters
//! (contiguous chunks, in adapter order), every adapter runs on its own task
//! with its own timeout, and results are merged once all tasks have finished
//! or timed out.

use crate::adapter::PriceAdapter;
use chrono::Utc;
use futures_util::future::join_all;
use pricewatch_core::{CoinKey, PriceSnapshot, Provider};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to one adapter during a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Returned prices; the count is what made it into the snapshot.
    Fetched(usize),
    /// Returned an error.
    Failed(String),
    /// Exceeded the per-adapter timeout.
    TimedOut,
    /// The adapter task panicked or was cancelled.
    Aborted(String),
    /// No coins were assigned to the adapter.
    Skipped,
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Fetched(_) | ProviderOutcome::Skipped)
    }
}

impl fmt::Display for ProviderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderOutcome::Fetched(n) => write!(f, "{} prices", n),
            ProviderOutcome::Failed(e) => write!(f, "failed: {}", e),
            ProviderOutcome::TimedOut => f.write_str("timed out"),
            ProviderOutcome::Aborted(e) => write!(f, "aborted: {}", e),
            ProviderOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Merged result of one poll.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub snapshot: PriceSnapshot,
    pub outcomes: Vec<(Provider, ProviderOutcome)>,
}

/// Runs the configured adapters concurrently over a sharded coin universe.
pub struct FetchOrchestrator {
    adapters: Vec<Arc<dyn PriceAdapter>>,
    timeout: Duration,
}

impl FetchOrchestrator {
    /// Create an orchestrator. Adapter order defines shard order.
    pub fn new(adapters: Vec<Arc<dyn PriceAdapter>>, timeout: Duration) -> Self {
        Self { adapters, timeout }
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.iter().map(|a| a.provider()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Split `coins` into one contiguous shard per adapter.
    ///
    /// Shard size is `ceil(n / adapters)`; trailing adapters may receive an
    /// empty shard. The same input always yields the same assignment.
    pub fn partition(&self, coins: &[CoinKey]) -> Vec<Vec<CoinKey>> {
        let count = self.adapters.len();
        let mut shards = vec![Vec::new(); count];
        if count == 0 || coins.is_empty() {
            return shards;
        }

        let shard_size = coins.len().div_ceil(count);
        for (shard, chunk) in shards.iter_mut().zip(coins.chunks(shard_size)) {
            shard.extend_from_slice(chunk);
        }
        shards
    }

    /// Poll every adapter over its shard and merge the results.
    ///
    /// Never fails: adapter errors, timeouts and panics only remove that
    /// adapter's coins from the snapshot.
    pub async fn poll(&self, coins: &[CoinKey]) -> PollResult {
        let mut snapshot = PriceSnapshot::new(Utc::now());
        let shards = self.partition(coins);

        let mut pending = Vec::with_capacity(self.adapters.len());
        for (adapter, shard) in self.adapters.iter().zip(shards) {
            let provider = adapter.provider();
            if shard.is_empty() {
                pending.push((provider, HashSet::new(), None));
                continue;
            }

            let owned: HashSet<CoinKey> = shard.iter().cloned().collect();
            let adapter = Arc::clone(adapter);
            let timeout = self.timeout;
            let handle = tokio::spawn(async move {
                tokio::time::timeout(timeout, adapter.fetch_prices(&shard)).await
            });
            pending.push((provider, owned, Some(handle)));
        }

        let handles: Vec<_> = pending
            .iter_mut()
            .filter_map(|(_, _, handle)| handle.as_mut())
            .collect();
        let mut joined = join_all(handles).await.into_iter();

        let mut outcomes = Vec::with_capacity(pending.len());
        for (provider, owned, handle) in pending {
            let result = match handle.and_then(|_| joined.next()) {
                Some(result) => result,
                None => {
                    outcomes.push((provider, ProviderOutcome::Skipped));
                    continue;
                }
            };

            let outcome = match result {
                Ok(Ok(Ok(prices))) => {
                    let mut merged = 0;
                    for (coin, price) in prices {
                        if !owned.contains(&coin) {
                            debug!(
                                provider = %provider,
                                coin = %coin,
                                "Dropping coin outside shard"
                            );
                            continue;
                        }
                        if snapshot.insert(coin, price) {
                            merged += 1;
                        }
                    }
                    ProviderOutcome::Fetched(merged)
                }
                Ok(Ok(Err(e))) => {
                    warn!(provider = %provider, error = %e, "Provider fetch failed");
                    ProviderOutcome::Failed(e.to_string())
                }
                Ok(Err(_elapsed)) => {
                    warn!(
                        provider = %provider,
                        timeout = ?self.timeout,
                        "Provider fetch timed out"
                    );
                    ProviderOutcome::TimedOut
                }
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Provider task aborted");
                    ProviderOutcome::Aborted(e.to_string())
                }
            };
            outcomes.push((provider, outcome));
        }

        info!(
            requested = coins.len(),
            priced = snapshot.len(),
            "Poll complete"
        );
        PollResult { snapshot, outcomes }
    }
}
