use pricewatch_core::{CoinKey, Provider};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{fetch_chunked, get_json, insert_price, PriceAdapter};
use crate::{FeedError, FeedResult, IdentifierRegistry};

/// CoinMarketCap `quotes/latest` adapter. Native ids are ticker symbols.
pub struct CoinMarketCapAdapter {
    client: reqwest::Client,
    registry: Arc<IdentifierRegistry>,
    api_key: Option<String>,
    base_url: String,
}

impl CoinMarketCapAdapter {
    const BASE_URL: &'static str = "https://pro-api.coinmarketcap.com";
    const MAX_SYMBOLS_PER_REQUEST: usize = 100;

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

    async fn fetch_chunk(
        &self,
        api_key: &str,
        symbols: Vec<String>,
    ) -> FeedResult<HashMap<String, f64>> {
        let url = format!("{}/v1/cryptocurrency/quotes/latest", self.base_url);
        let request = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", api_key)
            .query(&[
                ("symbol", symbols.join(",")),
                ("convert", "USD".to_string()),
                ("skip_invalid", "true".to_string()),
            ]);

        let body: Value = get_json(Provider::CoinMarketCap, request).await?;
        Self::parse_quotes(&body)
    }

    /// Parse `{"status": {...}, "data": {"BTC": {"quote": {"USD": {"price": ..}}}}}`.
    ///
    /// A symbol shared by several listings may come back as an array; the
    /// first (highest ranked) listing wins.
    pub fn parse_quotes(body: &Value) -> FeedResult<HashMap<String, f64>> {
        let error_code = body["status"]["error_code"].as_i64().unwrap_or(0);
        if error_code != 0 {
            return Err(FeedError::Api {
                provider: Provider::CoinMarketCap,
                message: body["status"]["error_message"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        let data = body["data"].as_object().ok_or_else(|| FeedError::Parse {
            provider: Provider::CoinMarketCap,
            message: "missing data object".to_string(),
        })?;

        let mut prices = HashMap::new();
        for (symbol, entry) in data {
            let listing = match entry {
                Value::Array(listings) => match listings.first() {
                    Some(first) => first,
                    None => continue,
                },
                other => other,
            };
            insert_price(
                Provider::CoinMarketCap,
                &mut prices,
                &symbol.to_ascii_uppercase(),
                &listing["quote"]["USD"]["price"],
            );
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl PriceAdapter for CoinMarketCapAdapter {
    fn provider(&self) -> Provider {
        Provider::CoinMarketCap
    }

    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>> {
        let batch = self.registry.resolve(Provider::CoinMarketCap, coins).uppercase();
        if batch.is_empty() {
            debug!("CoinMarketCap: No mapped coins to fetch");
            return Ok(HashMap::new());
        }
        let api_key = self.api_key.as_deref().ok_or(FeedError::MissingCredentials {
            provider: Provider::CoinMarketCap,
        })?;
        debug!("CoinMarketCap: Fetching {} prices", batch.len());

        let native = fetch_chunked(
            Provider::CoinMarketCap,
            batch.ids(),
            Self::MAX_SYMBOLS_PER_REQUEST,
            |symbols| self.fetch_chunk(api_key, symbols),
        )
        .await?;

        let prices = batch.fan_out(native);
        debug!("CoinMarketCap: Successfully fetched {} prices", prices.len());
        Ok(prices)
    }
}
