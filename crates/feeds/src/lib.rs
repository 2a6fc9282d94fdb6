//! Price collection from external REST providers.
//!
//! ## Architecture
//!
//! - `registry` - Canonical coin key to provider-native id lookup
//! - `adapter/` - Provider-specific request building and response parsing
//! - `orchestrator` - Sharding, concurrent per-adapter fetch, snapshot merge

pub mod adapter;
pub mod error;
pub mod orchestrator;
pub mod registry;

pub use adapter::{
    CoinGeckoAdapter, CoinMarketCapAdapter, CoinPaprikaAdapter, CryptoCompareAdapter,
    MessariAdapter, PriceAdapter,
};
pub use error::*;
pub use orchestrator::*;
pub use registry::*;
