use pricewatch_core::{CoinKey, Provider};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{fetch_chunked, get_json, insert_price, PriceAdapter};
use crate::{FeedError, FeedResult, IdentifierRegistry};

/// CryptoCompare `pricemulti` adapter. Native ids are ticker symbols.
pub struct CryptoCompareAdapter {
    client: reqwest::Client,
    registry: Arc<IdentifierRegistry>,
    api_key: Option<String>,
    base_url: String,
}

impl CryptoCompareAdapter {
    const BASE_URL: &'static str = "https://min-api.cryptocompare.com";
    // fsyms is capped at 300 characters
    const MAX_SYMBOLS_PER_REQUEST: usize = 50;

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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_chunk(&self, symbols: Vec<String>) -> FeedResult<HashMap<String, f64>> {
        let url = format!("{}/data/pricemulti", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("fsyms", symbols.join(",")), ("tsyms", "USD".to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Apikey {}", key));
        }

        let body: Value = get_json(Provider::CryptoCompare, request).await?;
        Self::parse_price_multi(&body)
    }

    /// Parse `{"BTC": {"USD": 65000.0}, ...}`.
    ///
    /// Errors are reported in-band with HTTP 200:
    /// `{"Response": "Error", "Message": "..."}`.
    pub fn parse_price_multi(body: &Value) -> FeedResult<HashMap<String, f64>> {
        if body["Response"].as_str() == Some("Error") {
            let message = body["Message"].as_str().unwrap_or("unknown error");
            if message.to_ascii_lowercase().contains("rate limit") {
                return Err(FeedError::RateLimited {
                    provider: Provider::CryptoCompare,
                });
            }
            return Err(FeedError::Api {
                provider: Provider::CryptoCompare,
                message: message.to_string(),
            });
        }

        let entries = body.as_object().ok_or_else(|| FeedError::Parse {
            provider: Provider::CryptoCompare,
            message: "expected an object keyed by symbol".to_string(),
        })?;

        let mut prices = HashMap::new();
        for (symbol, quote) in entries {
            insert_price(
                Provider::CryptoCompare,
                &mut prices,
                &symbol.to_ascii_uppercase(),
                &quote["USD"],
            );
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl PriceAdapter for CryptoCompareAdapter {
    fn provider(&self) -> Provider {
        Provider::CryptoCompare
    }

    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>> {
        let batch = self.registry.resolve(Provider::CryptoCompare, coins).uppercase();
        if batch.is_empty() {
            debug!("CryptoCompare: No mapped coins to fetch");
            return Ok(HashMap::new());
        }
        debug!("CryptoCompare: Fetching {} prices", batch.len());

        let native = fetch_chunked(
            Provider::CryptoCompare,
            batch.ids(),
            Self::MAX_SYMBOLS_PER_REQUEST,
            |symbols| self.fetch_chunk(symbols),
        )
        .await?;

        let prices = batch.fan_out(native);
        debug!("CryptoCompare: Successfully fetched {} prices", prices.len());
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cryptocompare_parse_price_multi() {
        let body = json!({
            "BTC": { "USD": 65001.0 },
            "sol": { "USD": 145.2 },
            "XYZ": { "EUR": 1.0 }
        });

        let prices = CryptoCompareAdapter::parse_price_multi(&body).unwrap();
        assert_eq!(prices.len(), 2);
        assert!((prices["BTC"] - 65001.0).abs() < 1e-9);
        assert!((prices["SOL"] - 145.2).abs() < 1e-9);
    }

    #[test]
    fn test_cryptocompare_in_band_error() {
        let body = json!({
            "Response": "Error",
            "Message": "fsyms param is invalid.",
            "Type": 2
        });
        let err = CryptoCompareAdapter::parse_price_multi(&body).unwrap_err();
        assert!(matches!(err, FeedError::Api { .. }));
    }

    #[test]
    fn test_cryptocompare_in_band_rate_limit() {
        let body = json!({
            "Response": "Error",
            "Message": "You are over your rate limit please upgrade your account!"
        });
        let err = CryptoCompareAdapter::parse_price_multi(&body).unwrap_err();
        assert!(matches!(err, FeedError::RateLimited { .. }));
    }
}
