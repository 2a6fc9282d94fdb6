use pricewatch_core::{CoinKey, Provider};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{get_json, price_value, PriceAdapter};
use crate::{FeedError, FeedResult, IdentifierRegistry};

/// Messari asset metrics adapter. Native ids are asset slugs.
///
/// The market-data endpoint serves one asset per request, so coins are
/// fetched sequentially with a pause between requests. Each cycle is bounded
/// by a request cap and a deadline; whatever was gathered by then is
/// returned. The next cycle resumes where the previous one stopped, so a
/// shard larger than one cycle's budget is covered over several cycles.
pub struct MessariAdapter {
    client: reqwest::Client,
    registry: Arc<IdentifierRegistry>,
    api_key: Option<String>,
    base_url: String,
    pacing: Duration,
    max_requests: usize,
    deadline: Duration,
    cursor: AtomicUsize,
}

impl MessariAdapter {
    const BASE_URL: &'static str = "https://data.messari.io/api/v1";
    const DEFAULT_PACING: Duration = Duration::from_millis(250);
    const DEFAULT_MAX_REQUESTS: usize = 50;
    const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

    pub fn new(
        client: reqwest::Client,
        registry: Arc<IdentifierRegistry>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            registry,
            api_key,
            base_url: Self::BASE_URL.to_string(),
            pacing: Self::DEFAULT_PACING,
            max_requests: Self::DEFAULT_MAX_REQUESTS,
            deadline: Self::DEFAULT_DEADLINE,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Delay between consecutive per-asset requests.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Upper bound on requests issued per cycle.
    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    /// Time budget for one cycle. Must stay below the orchestrator's
    /// per-adapter timeout, otherwise partial results are lost with it.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn fetch_one(&self, slug: &str) -> FeedResult<Option<f64>> {
        let url = format!("{}/assets/{}/metrics/market-data", self.base_url, slug);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-messari-api-key", key);
        }

        let body: Value = get_json(Provider::Messari, request).await?;
        Self::parse_market_data(&body)
    }

    /// Parse `{"data": {"market_data": {"price_usd": ..}}}`.
    /// A null or unusable price is `Ok(None)`.
    pub fn parse_market_data(body: &Value) -> FeedResult<Option<f64>> {
        if let Some(message) = body["status"]["error_message"].as_str() {
            return Err(FeedError::Api {
                provider: Provider::Messari,
                message: message.to_string(),
            });
        }

        let market_data = &body["data"]["market_data"];
        if !market_data.is_object() {
            return Err(FeedError::Parse {
                provider: Provider::Messari,
                message: "missing data.market_data".to_string(),
            });
        }
        Ok(price_value(&market_data["price_usd"]))
    }
}

#[async_trait::async_trait]
impl PriceAdapter for MessariAdapter {
    fn provider(&self) -> Provider {
        Provider::Messari
    }

    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>> {
        let batch = self.registry.resolve(Provider::Messari, coins);
        if batch.is_empty() {
            debug!("Messari: No mapped coins to fetch");
            return Ok(HashMap::new());
        }

        let slugs = batch.ids();
        if slugs.len() > self.max_requests {
            debug!(
                provider = %Provider::Messari,
                requested = slugs.len(),
                cap = self.max_requests,
                "More assets than one cycle allows, rotating across cycles"
            );
        }

        let start = self.cursor.load(Ordering::Relaxed) % slugs.len();
        let run = fetch_paced(
            slugs,
            start,
            self.max_requests,
            self.pacing,
            self.deadline,
            |slug| async move { self.fetch_one(&slug).await },
        )
        .await;
        self.cursor.store((start + run.attempted) % slugs.len(), Ordering::Relaxed);

        let PacedRun {
            prices: native,
            last_error,
            ..
        } = run;

        match last_error {
            Some(e) if native.is_empty() => Err(e),
            _ => {
                let prices = batch.fan_out(native);
                debug!("Messari: Successfully fetched {} prices", prices.len());
                Ok(prices)
            }
        }
    }
}

/// Outcome of one paced pass.
struct PacedRun {
    prices: HashMap<String, f64>,
    last_error: Option<FeedError>,
    attempted: usize,
}

/// Fetch `ids` one at a time from `start` (wrapping), at most `max_requests`
/// of them, pausing `pacing` between requests.
///
/// Stops once `budget` has elapsed, including mid-request, and keeps what was
/// gathered. Item failures are skipped; a failure that halts the batch stops
/// the pass.
async fn fetch_paced<F, Fut>(
    ids: &[String],
    start: usize,
    max_requests: usize,
    pacing: Duration,
    budget: Duration,
    mut fetch: F,
) -> PacedRun
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = FeedResult<Option<f64>>>,
{
    let deadline = Instant::now() + budget;
    let mut run = PacedRun {
        prices: HashMap::new(),
        last_error: None,
        attempted: 0,
    };
    if ids.is_empty() {
        return run;
    }

    for step in 0..ids.len().min(max_requests) {
        let slug = &ids[(start + step) % ids.len()];
        if step > 0 {
            if Instant::now() + pacing >= deadline {
                warn!(
                    provider = %Provider::Messari,
                    fetched = run.prices.len(),
                    "Cycle deadline reached, returning partial results"
                );
                break;
            }
            tokio::time::sleep(pacing).await;
        }

        run.attempted += 1;
        let result = match tokio::time::timeout_at(deadline, fetch(slug.clone())).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(provider = %Provider::Messari, id = %slug, "Cycle deadline hit mid-request");
                break;
            }
        };

        match result {
            Ok(Some(price)) => {
                run.prices.insert(slug.clone(), price);
            }
            Ok(None) => debug!(provider = %Provider::Messari, id = %slug, "No price reported"),
            Err(e) => {
                warn!(provider = %Provider::Messari, id = %slug, error = %e, "Asset fetch failed");
                let halt = e.halts_batch();
                run.last_error = Some(e);
                if halt {
                    break;
                }
            }
        }
    }

    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messari_parse_market_data() {
        let body = json!({
            "status": { "elapsed": 10, "timestamp": "2024-05-01T12:00:00Z" },
            "data": {
                "id": "1e31218a-e44e-4285-820c-8282ee222035",
                "symbol": "BTC",
                "market_data": { "price_usd": 64970.25 }
            }
        });
        let price = MessariAdapter::parse_market_data(&body).unwrap();
        assert_eq!(price, Some(64970.25));
    }

    #[test]
    fn test_messari_null_price_is_none() {
        let body = json!({ "data": { "market_data": { "price_usd": null } } });
        assert_eq!(MessariAdapter::parse_market_data(&body).unwrap(), None);
    }

    #[test]
    fn test_messari_error_message() {
        let body = json!({
            "status": { "error_code": 404, "error_message": "Asset not found" }
        });
        let err = MessariAdapter::parse_market_data(&body).unwrap_err();
        assert!(matches!(err, FeedError::Api { .. }));
    }

    #[test]
    fn test_messari_missing_market_data() {
        let err = MessariAdapter::parse_market_data(&json!({ "data": {} })).unwrap_err();
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_messari_transport_failure_is_error() {
        let mut section = std::collections::BTreeMap::new();
        section.insert(CoinKey::new("bitcoin"), "bitcoin".to_string());
        let registry = Arc::new(IdentifierRegistry::from_sections(
            std::collections::BTreeMap::from([(Provider::Messari, section)]),
        ));
        let adapter = MessariAdapter::new(reqwest::Client::new(), registry, None)
            .with_base_url("http://127.0.0.1:9")
            .with_pacing(Duration::ZERO);

        let result = adapter.fetch_prices(&[CoinKey::new("bitcoin")]).await;
        assert!(result.is_err());
    }

    fn slugs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_fetch_keeps_partial_results_at_deadline() {
        let ids = slugs(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let started = Instant::now();

        let run = fetch_paced(
            &ids,
            0,
            50,
            Duration::from_millis(250),
            Duration::from_secs(5),
            |_| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, FeedError>(Some(1.0))
            },
        )
        .await;

        // 1s per request plus 250ms pacing: four requests fit in 5s.
        assert_eq!(run.prices.len(), 4);
        assert_eq!(run.attempted, 4);
        assert!(run.last_error.is_none());
        assert!(started.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_fetch_abandons_slow_request() {
        let ids = slugs(&["a", "b"]);
        let started = Instant::now();

        let run = fetch_paced(
            &ids,
            0,
            50,
            Duration::ZERO,
            Duration::from_secs(5),
            |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, FeedError>(Some(1.0))
            },
        )
        .await;

        assert!(run.prices.is_empty());
        assert_eq!(run.attempted, 1);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_paced_fetch_wraps_from_start_offset() {
        let ids = slugs(&["a", "b", "c", "d", "e"]);
        let mut seen = Vec::new();

        let run = fetch_paced(
            &ids,
            4,
            2,
            Duration::ZERO,
            Duration::from_secs(5),
            |slug| {
                seen.push(slug);
                async { Ok::<_, FeedError>(Some(1.0)) }
            },
        )
        .await;

        assert_eq!(run.attempted, 2);
        assert_eq!(seen, vec!["e".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_paced_fetch_stops_on_rate_limit() {
        let ids = slugs(&["a", "b", "c"]);
        let mut calls = 0;

        let run = fetch_paced(
            &ids,
            0,
            50,
            Duration::ZERO,
            Duration::from_secs(5),
            |slug| {
                calls += 1;
                async move {
                    if slug == "b" {
                        Err(FeedError::RateLimited {
                            provider: Provider::Messari,
                        })
                    } else {
                        Ok(Some(2.0))
                    }
                }
            },
        )
        .await;

        assert_eq!(calls, 2);
        assert_eq!(run.prices.len(), 1);
        assert!(matches!(run.last_error, Some(FeedError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_messari_cursor_advances_across_cycles() {
        let mut section = std::collections::BTreeMap::new();
        for coin in ["a", "b", "c"] {
            section.insert(CoinKey::new(coin), coin.to_string());
        }
        let registry = Arc::new(IdentifierRegistry::from_sections(
            std::collections::BTreeMap::from([(Provider::Messari, section)]),
        ));
        let adapter = MessariAdapter::new(reqwest::Client::new(), registry, None)
            .with_base_url("http://127.0.0.1:9")
            .with_pacing(Duration::ZERO)
            .with_max_requests(2);

        let coins = [CoinKey::new("a"), CoinKey::new("b"), CoinKey::new("c")];
        let _ = adapter.fetch_prices(&coins).await;
        assert_eq!(adapter.cursor.load(Ordering::Relaxed), 2);

        let _ = adapter.fetch_prices(&coins).await;
        assert_eq!(adapter.cursor.load(Ordering::Relaxed), 1);
    }
}
