//! Price provider identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// External price source.
///
/// The lowercase name doubles as the section key in the identifier-mapping
/// document and as the value used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    CoinGecko,
    CoinMarketCap,
    CryptoCompare,
    Messari,
    CoinPaprika,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl Provider {
    /// Section key used in mapping documents and config files.
    pub fn key(self) -> &'static str {
        match self {
            Provider::CoinGecko => "coingecko",
            Provider::CoinMarketCap => "coinmarketcap",
            Provider::CryptoCompare => "cryptocompare",
            Provider::Messari => "messari",
            Provider::CoinPaprika => "coinpaprika",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::CoinGecko => "CoinGecko",
            Provider::CoinMarketCap => "CoinMarketCap",
            Provider::CryptoCompare => "CryptoCompare",
            Provider::Messari => "Messari",
            Provider::CoinPaprika => "CoinPaprika",
        }
    }

    /// All providers in default shard order.
    pub fn all() -> &'static [Provider] {
        &[
            Provider::CoinGecko,
            Provider::CoinMarketCap,
            Provider::CryptoCompare,
            Provider::Messari,
            Provider::CoinPaprika,
        ]
    }

    /// Whether the provider refuses requests without an API key.
    pub fn requires_api_key(self) -> bool {
        matches!(self, Provider::CoinMarketCap)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::all()
            .iter()
            .copied()
            .find(|p| p.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}
