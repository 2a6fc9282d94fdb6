use pricewatch_core::{CoinKey, Provider};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{fetch_chunked, get_json, insert_price, PriceAdapter};
use crate::{FeedError, FeedResult, IdentifierRegistry};

/// CoinGecko `simple/price` adapter. Native ids are CoinGecko coin ids
/// (`bitcoin`, `ethereum`).
pub struct CoinGeckoAdapter {
    client: reqwest::Client,
    registry: Arc<IdentifierRegistry>,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoAdapter {
    const BASE_URL: &'static str = "https://api.coingecko.com/api/v3";
    const MAX_IDS_PER_REQUEST: usize = 250;

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
        }
    }

    /// Override the API root (proxies, pro endpoint).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_chunk(&self, ids: Vec<String>) -> FeedResult<HashMap<String, f64>> {
        let url = format!("{}/simple/price", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let body: Value = get_json(Provider::CoinGecko, request).await?;
        Self::parse_simple_price(&body)
    }

    /// Parse `{"bitcoin": {"usd": 65000.0}, ...}`.
    pub fn parse_simple_price(body: &Value) -> FeedResult<HashMap<String, f64>> {
        let entries = body.as_object().ok_or_else(|| FeedError::Parse {
            provider: Provider::CoinGecko,
            message: "expected an object keyed by coin id".to_string(),
        })?;

        let mut prices = HashMap::new();
        for (id, quote) in entries {
            insert_price(Provider::CoinGecko, &mut prices, id, &quote["usd"]);
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl PriceAdapter for CoinGeckoAdapter {
    fn provider(&self) -> Provider {
        Provider::CoinGecko
    }

    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>> {
        let batch = self.registry.resolve(Provider::CoinGecko, coins);
        if batch.is_empty() {
            debug!("CoinGecko: No mapped coins to fetch");
            return Ok(HashMap::new());
        }
        debug!("CoinGecko: Fetching {} prices", batch.len());

        let native = fetch_chunked(
            Provider::CoinGecko,
            batch.ids(),
            Self::MAX_IDS_PER_REQUEST,
            |ids| self.fetch_chunk(ids),
        )
        .await?;

        let prices = batch.fan_out(native);
        debug!("CoinGecko: Successfully fetched {} prices", prices.len());
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coingecko_parse_simple_price() {
        let body = json!({
            "bitcoin": { "usd": 65000.12 },
            "ethereum": { "usd": 3100 },
            "ghost": { "usd": null },
            "empty": {}
        });

        let prices = CoinGeckoAdapter::parse_simple_price(&body).unwrap();
        assert_eq!(prices.len(), 2);
        assert!((prices["bitcoin"] - 65000.12).abs() < 1e-9);
        assert!((prices["ethereum"] - 3100.0).abs() < 1e-9);
    }

    #[test]
    fn test_coingecko_parse_rejects_non_object() {
        let err = CoinGeckoAdapter::parse_simple_price(&json!(["bitcoin"])).unwrap_err();
        assert!(matches!(err, FeedError::Parse { provider: Provider::CoinGecko, .. }));
    }

    #[tokio::test]
    async fn test_coingecko_unmapped_coins_make_no_request() {
        let registry = Arc::new(IdentifierRegistry::default());
        // Unroutable base URL: any request would fail.
        let adapter = CoinGeckoAdapter::new(reqwest::Client::new(), registry, None)
            .with_base_url("http://127.0.0.1:9");

        let prices = adapter.fetch_prices(&[CoinKey::new("bitcoin")]).await.unwrap();
        assert!(prices.is_empty());
    }
}
