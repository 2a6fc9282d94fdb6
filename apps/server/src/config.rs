//! Application configuration.

use pricewatch_alerts::TelegramConfig;
use pricewatch_core::{CoinKey, Provider};
use pricewatch_engine::{DetectorConfig, MonitorConfig};
use pricewatch_feeds::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Identifier mapping: {0}")]
    Registry(#[from] RegistryError),
}

/// Application configuration, read from a camelCase JSON file.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Minimum fractional change that alerts (0.05 = 5%).
    pub threshold: f64,
    /// Lookback distance in samples and retained points per coin.
    pub window_size: usize,
    pub poll_interval_seconds: u64,
    pub history_path: PathBuf,
    pub mapping_path: PathBuf,
    /// Per-provider deadline for one poll.
    pub adapter_timeout_seconds: u64,
    /// Enabled providers, in shard order.
    pub providers: Vec<Provider>,
    /// Explicit coin universe. Defaults to every coin in the mapping.
    pub coins: Option<Vec<CoinKey>>,
    pub provider_credentials: BTreeMap<Provider, String>,
    pub telegram: TelegramConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            window_size: 3,
            poll_interval_seconds: 300,
            history_path: PathBuf::from("price_history.json"),
            mapping_path: PathBuf::from("id_mappings.json"),
            adapter_timeout_seconds: 20,
            providers: Provider::all().to_vec(),
            coins: None,
            provider_credentials: BTreeMap::new(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let credentials: Vec<&Provider> = self.provider_credentials.keys().collect();
        f.debug_struct("AppConfig")
            .field("threshold", &self.threshold)
            .field("window_size", &self.window_size)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("history_path", &self.history_path)
            .field("mapping_path", &self.mapping_path)
            .field("adapter_timeout_seconds", &self.adapter_timeout_seconds)
            .field("providers", &self.providers)
            .field("coins", &self.coins)
            .field("provider_credentials", &credentials)
            .field("telegram", &self.telegram)
            .finish()
    }
}

impl AppConfig {
    /// Read the config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply credential and path overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for (provider, name) in [
            (Provider::CoinGecko, "COINGECKO_API_KEY"),
            (Provider::CoinMarketCap, "COINMARKETCAP_API_KEY"),
            (Provider::CryptoCompare, "CRYPTOCOMPARE_API_KEY"),
            (Provider::Messari, "MESSARI_API_KEY"),
        ] {
            if let Some(key) = var(name) {
                self.provider_credentials.insert(provider, key);
            }
        }

        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = chat_id;
        }
        if let Some(path) = var("PRICE_HISTORY_FILE") {
            self.history_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("windowSize must be at least 1".to_string()));
        }
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pollIntervalSeconds must be at least 1".to_string(),
            ));
        }
        if self.adapter_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "adapterTimeoutSeconds must be at least 1".to_string(),
            ));
        }
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("no providers enabled".to_string()));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider) {
                return Err(ConfigError::Invalid(format!(
                    "provider {} listed more than once",
                    provider
                )));
            }
            if provider.requires_api_key() && self.api_key(*provider).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} is enabled but has no API key",
                    provider
                )));
            }
        }

        if matches!(&self.coins, Some(coins) if coins.is_empty()) {
            return Err(ConfigError::Invalid("coins is set but empty".to_string()));
        }

        Ok(())
    }

    pub fn api_key(&self, provider: Provider) -> Option<String> {
        self.provider_credentials
            .get(&provider)
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_seconds)
    }

    pub fn monitor_config(&self, coins: Vec<CoinKey>) -> MonitorConfig {
        MonitorConfig {
            detector: DetectorConfig::from(self),
            history_path: self.history_path.clone(),
            coins,
        }
    }
}

impl From<&AppConfig> for DetectorConfig {
    fn from(config: &AppConfig) -> Self {
        DetectorConfig {
            threshold: config.threshold,
            window_size: config.window_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn with_cmc_key() -> AppConfig {
        let mut config = AppConfig::default();
        config
            .provider_credentials
            .insert(Provider::CoinMarketCap, "cmc-key".to_string());
        config
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.threshold, 0.05);
        assert_eq!(config.window_size, 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.adapter_timeout(), Duration::from_secs(20));
        assert_eq!(config.providers, Provider::all().to_vec());
        assert_eq!(config.history_path, PathBuf::from("price_history.json"));
    }

    #[test]
    fn test_parse_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricewatch.json");
        std::fs::write(
            &path,
            r#"{
                "threshold": 0.1,
                "windowSize": 5,
                "providers": ["coingecko", "coinpaprika"],
                "coins": ["bitcoin", "ethereum"],
                "providerCredentials": { "coingecko": "cg-key" },
                "telegram": { "chatId": "-100200" }
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.window_size, 5);
        assert_eq!(config.poll_interval_seconds, 300);
        assert_eq!(
            config.providers,
            vec![Provider::CoinGecko, Provider::CoinPaprika]
        );
        assert_eq!(
            config.coins,
            Some(vec![CoinKey::new("bitcoin"), CoinKey::new("ethereum")])
        );
        assert_eq!(config.api_key(Provider::CoinGecko).as_deref(), Some("cg-key"));
        assert_eq!(config.telegram.chat_id, "-100200");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.window_size, 3);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricewatch.json");
        std::fs::write(&path, r#"{"providers": ["binance"]}"#).unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("COINMARKETCAP_API_KEY", "from-env"),
            ("MESSARI_API_KEY", "  "),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
            ("PRICE_HISTORY_FILE", "/var/lib/pricewatch/history.json"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_with(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.api_key(Provider::CoinMarketCap).as_deref(),
            Some("from-env")
        );
        assert_eq!(config.api_key(Provider::Messari), None);
        assert!(config.telegram.is_complete());
        assert_eq!(
            config.history_path,
            PathBuf::from("/var/lib/pricewatch/history.json")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = with_cmc_key();
        config.threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.poll_interval_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.providers = vec![Provider::CoinGecko, Provider::CoinGecko];
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.providers.clear();
        assert!(config.validate().is_err());

        let mut config = with_cmc_key();
        config.coins = Some(Vec::new());
        assert!(config.validate().is_err());

        assert!(with_cmc_key().validate().is_ok());
    }

    #[test]
    fn test_cmc_without_key_is_rejected() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("CoinMarketCap"));

        let mut config = AppConfig::default();
        config.providers.retain(|p| *p != Provider::CoinMarketCap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitor_config_from_app_config() {
        let mut config = AppConfig::default();
        config.threshold = 0.02;
        config.window_size = 6;

        let monitor = config.monitor_config(vec![CoinKey::new("bitcoin")]);
        assert_eq!(
            monitor.detector,
            DetectorConfig {
                threshold: 0.02,
                window_size: 6
            }
        );
        assert_eq!(monitor.history_path, PathBuf::from("price_history.json"));
        assert_eq!(monitor.coins.len(), 1);
    }

    #[test]
    fn test_debug_hides_credentials() {
        let mut config = with_cmc_key();
        config.telegram = TelegramConfig::new("123:secret", "42");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("cmc-key"));
        assert!(!rendered.contains("123:secret"));
    }
}
