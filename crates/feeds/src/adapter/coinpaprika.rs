use pricewatch_core::{CoinKey, Provider};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{get_json, insert_price, PriceAdapter};
use crate::{FeedError, FeedResult, IdentifierRegistry};

/// CoinPaprika adapter. Native ids are paprika coin ids (`btc-bitcoin`) or
/// ticker symbols (`BTC`).
///
/// The ticker endpoint has no id filter, so all tickers are fetched in a
/// single call and filtered locally. One request per cycle regardless of
/// how many coins are assigned.
pub struct CoinPaprikaAdapter {
    client: reqwest::Client,
    registry: Arc<IdentifierRegistry>,
    base_url: String,
}

impl CoinPaprikaAdapter {
    const BASE_URL: &'static str = "https://api.coinpaprika.com/v1";

    pub fn new(client: reqwest::Client, registry: Arc<IdentifierRegistry>) -> Self {
        Self {
            client,
            registry,
            base_url: Self::BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse `[{"id": "btc-bitcoin", "symbol": "BTC", "quotes": {"USD": {"price": ..}}}, ...]`,
    /// keeping only `wanted` entries.
    ///
    /// A wanted entry matches a ticker id, or else a ticker symbol
    /// (case-insensitive). Tickers arrive in rank order, so the first ticker
    /// carrying a shared symbol wins.
    pub fn parse_tickers(
        body: &Value,
        wanted: &HashSet<&str>,
    ) -> FeedResult<HashMap<String, f64>> {
        let tickers = body.as_array().ok_or_else(|| FeedError::Parse {
            provider: Provider::CoinPaprika,
            message: "expected an array of tickers".to_string(),
        })?;

        let by_symbol: HashMap<String, &str> = wanted
            .iter()
            .map(|native| (native.to_ascii_uppercase(), *native))
            .collect();

        let mut prices = HashMap::new();
        for ticker in tickers {
            let price = &ticker["quotes"]["USD"]["price"];
            if let Some(id) = ticker["id"].as_str().filter(|id| wanted.contains(id)) {
                insert_price(Provider::CoinPaprika, &mut prices, id, price);
                continue;
            }

            let native = match ticker["symbol"].as_str() {
                Some(symbol) => by_symbol.get(&symbol.to_ascii_uppercase()),
                None => None,
            };
            if let Some(&native) = native {
                if !prices.contains_key(native) {
                    insert_price(Provider::CoinPaprika, &mut prices, native, price);
                }
            }
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl PriceAdapter for CoinPaprikaAdapter {
    fn provider(&self) -> Provider {
        Provider::CoinPaprika
    }

    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>> {
        let batch = self.registry.resolve(Provider::CoinPaprika, coins);
        if batch.is_empty() {
            debug!("CoinPaprika: No mapped coins to fetch");
            return Ok(HashMap::new());
        }
        debug!("CoinPaprika: Fetching {} prices via bulk ticker API", batch.len());

        let url = format!("{}/tickers", self.base_url);
        let request = self.client.get(&url).query(&[("quotes", "USD")]);
        let body: Value = get_json(Provider::CoinPaprika, request).await?;

        let wanted: HashSet<&str> = batch.ids().iter().map(String::as_str).collect();
        let native = Self::parse_tickers(&body, &wanted)?;

        let prices = batch.fan_out(native);
        debug!("CoinPaprika: Successfully fetched {} prices", prices.len());
        Ok(prices)
    }
}
