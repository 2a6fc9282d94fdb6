//! Canonical coin key to provider-native identifier mapping.
//!
//! The mapping document is produced offline, one section per provider:
//!
//! ```json
//! { "coingecko": { "bitcoin": "bitcoin" }, "coinmarketcap": { "bitcoin": "BTC" } }
//! ```
//!
//! A coin without an entry in a provider's section is simply not queried
//! from that provider.

use crate::error::RegistryError;
use pricewatch_core::{CoinKey, Provider};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Read-only lookup table built once at startup.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    sections: BTreeMap<Provider, BTreeMap<CoinKey, String>>,
}

impl IdentifierRegistry {
    /// Load the mapping document, requiring a section for each of `required`.
    pub fn load(path: impl AsRef<Path>, required: &[Provider]) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        info!("Loading identifier mapping from: {:?}", path);

        if !path.exists() {
            return Err(RegistryError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let registry = Self::from_json(&content, required)?;
        for (provider, section) in &registry.sections {
            info!(provider = %provider, coins = section.len(), "Loaded identifier section");
        }
        Ok(registry)
    }

    /// Parse a mapping document from a JSON string.
    pub fn from_json(content: &str, required: &[Provider]) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(content)?;

        let mut sections = BTreeMap::new();
        for (name, entries) in raw {
            let provider = match name.parse::<Provider>() {
                Ok(provider) => provider,
                Err(_) => {
                    debug!(section = %name, "Ignoring unknown mapping section");
                    continue;
                }
            };

            let mut section = BTreeMap::new();
            for (coin, native) in entries {
                let native = native.trim();
                if native.is_empty() {
                    return Err(RegistryError::EmptyId { provider, coin });
                }
                section.insert(CoinKey::from(coin), native.to_string());
            }
            sections.insert(provider, section);
        }

        let registry = Self { sections };
        registry.require(required)?;
        Ok(registry)
    }

    /// Build from in-memory sections.
    pub fn from_sections(sections: BTreeMap<Provider, BTreeMap<CoinKey, String>>) -> Self {
        Self { sections }
    }

    fn require(&self, required: &[Provider]) -> Result<(), RegistryError> {
        match required.iter().find(|p| !self.sections.contains_key(p)) {
            Some(&missing) => Err(RegistryError::MissingSection(missing)),
            None => Ok(()),
        }
    }

    /// Native id for a coin on a provider, if mapped.
    pub fn lookup(&self, provider: Provider, coin: &str) -> Option<&str> {
        self.sections
            .get(&provider)
            .and_then(|section| section.get(coin))
            .map(String::as_str)
    }

    pub fn has_section(&self, provider: Provider) -> bool {
        self.sections.contains_key(&provider)
    }

    /// Every coin key mentioned in any section, sorted.
    pub fn coin_keys(&self) -> Vec<CoinKey> {
        self.sections
            .values()
            .flat_map(|section| section.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Translate coin keys into one provider's native ids.
    /// Unmapped coins are dropped; request order follows `coins`.
    pub fn resolve(&self, provider: Provider, coins: &[CoinKey]) -> NativeBatch {
        let mut batch = NativeBatch::new(provider);
        for coin in coins {
            match self.lookup(provider, coin.as_str()) {
                Some(native) => batch.push(native.to_string(), coin.clone()),
                None => debug!(provider = %provider, coin = %coin, "No mapping, skipping"),
            }
        }
        batch
    }
}

/// Native ids to request from one provider, with the reverse index needed to
/// attribute returned prices back to canonical coin keys.
#[derive(Debug, Clone)]
pub struct NativeBatch {
    provider: Provider,
    ids: Vec<String>,
    owners: HashMap<String, Vec<CoinKey>>,
}

impl NativeBatch {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            ids: Vec::new(),
            owners: HashMap::new(),
        }
    }

    fn push(&mut self, native: String, coin: CoinKey) {
        let owners = self.owners.entry(native.clone()).or_default();
        if owners.is_empty() {
            self.ids.push(native);
        }
        if !owners.contains(&coin) {
            owners.push(coin);
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Deduplicated native ids in request order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rewrite native ids to upper case (symbol-keyed APIs echo symbols in
    /// upper case).
    pub fn uppercase(self) -> Self {
        let mut batch = NativeBatch::new(self.provider);
        for native in self.ids {
            let coins = self.owners.get(&native).cloned().unwrap_or_default();
            for coin in coins {
                batch.push(native.to_ascii_uppercase(), coin);
            }
        }
        batch
    }

    /// Map native-id prices back onto every coin key that owns the id.
    /// Ids that were never requested are ignored.
    pub fn fan_out(&self, native_prices: HashMap<String, f64>) -> HashMap<CoinKey, f64> {
        let mut prices = HashMap::new();
        for (native, price) in native_prices {
            match self.owners.get(&native) {
                Some(coins) => {
                    for coin in coins {
                        prices.insert(coin.clone(), price);
                    }
                }
                None => debug!(
                    provider = %self.provider,
                    id = %native,
                    "Unrequested id in response"
                ),
            }
        }
        prices
    }
}
