//! Canonical coin identity.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Provider-agnostic coin identifier (e.g. "bitcoin").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinKey(CompactString);

impl CoinKey {
    pub fn new(key: &str) -> Self {
        Self(CompactString::new(key))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CoinKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CoinKey {
    fn from(key: String) -> Self {
        Self(CompactString::from(key))
    }
}

impl AsRef<str> for CoinKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for CoinKey {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}
