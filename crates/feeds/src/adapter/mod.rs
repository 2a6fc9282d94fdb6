//! Provider adapter trait and implementations.
//!
//! Each price source has its own REST schema and identifier scheme.
//! Adapters translate canonical coin keys into native ids through the
//! [`IdentifierRegistry`](crate::IdentifierRegistry), issue as few requests
//! as the provider allows, and normalize the response into `coin -> price`.

mod coingecko;
mod coinmarketcap;
mod coinpaprika;
mod cryptocompare;
mod messari;

pub use coingecko::CoinGeckoAdapter;
pub use coinmarketcap::CoinMarketCapAdapter;
pub use coinpaprika::CoinPaprikaAdapter;
pub use cryptocompare::CryptoCompareAdapter;
pub use messari::MessariAdapter;

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use pricewatch_core::{is_valid_price, CoinKey, Provider};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// Maximum length of an error body kept in [`FeedError::Http`].
const MAX_ERROR_BODY: usize = 200;

/// A price source.
///
/// Implementations return a possibly partial map: coins that are unmapped,
/// missing from the response or carry an unusable price are left out. An
/// `Err` means the whole batch failed and nothing could be salvaged.
#[async_trait]
pub trait PriceAdapter: Send + Sync {
    /// Get the provider identifier
    fn provider(&self) -> Provider;

    /// Fetch USD prices for the given coins.
    async fn fetch_prices(&self, coins: &[CoinKey]) -> FeedResult<HashMap<CoinKey, f64>>;
}

/// Send a request and decode a JSON body, mapping HTTP failures onto
/// [`FeedError`].
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: Provider,
    request: reqwest::RequestBuilder,
) -> FeedResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| FeedError::from_reqwest(provider, e))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FeedError::RateLimited { provider });
    }
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(FeedError::Http {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FeedError::from_reqwest(provider, e))?;
    serde_json::from_slice(&bytes).map_err(|e| FeedError::Parse {
        provider,
        message: e.to_string(),
    })
}

/// Run `fetch` over `ids` in chunks of `chunk_size`, sequentially.
///
/// A failing chunk is logged and skipped once at least one chunk has
/// succeeded; if nothing succeeded the first error is returned.
pub(crate) async fn fetch_chunked<F, Fut>(
    provider: Provider,
    ids: &[String],
    chunk_size: usize,
    mut fetch: F,
) -> FeedResult<HashMap<String, f64>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = FeedResult<HashMap<String, f64>>>,
{
    let mut prices = HashMap::new();
    let mut first_error = None;
    let mut succeeded = false;

    for chunk in ids.chunks(chunk_size.max(1)) {
        match fetch(chunk.to_vec()).await {
            Ok(chunk_prices) => {
                succeeded = true;
                prices.extend(chunk_prices);
            }
            Err(e) => {
                warn!(provider = %provider, chunk = chunk.len(), error = %e, "Chunk failed");
                let halt = e.halts_batch();
                first_error.get_or_insert(e);
                if halt {
                    break;
                }
            }
        }
    }

    match first_error {
        Some(e) if !succeeded => Err(e),
        _ => Ok(prices),
    }
}

/// Read a price out of a JSON value. Numbers and numeric strings are
/// accepted; null, garbage, non-finite and non-positive values are not.
pub(crate) fn price_value(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    is_valid_price(price).then_some(price)
}

/// Insert a price if valid, logging the skip otherwise.
pub(crate) fn insert_price(
    provider: Provider,
    prices: &mut HashMap<String, f64>,
    id: &str,
    value: &Value,
) {
    match price_value(value) {
        Some(price) => {
            prices.insert(id.to_string(), price);
        }
        None => debug!(provider = %provider, id = id, value = %value, "Skipping unusable price"),
    }
}
