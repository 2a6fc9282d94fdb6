//! Error types for feed operations.

use pricewatch_core::Provider;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a single provider adapter. Always scoped to that
/// adapter: the orchestrator logs them and treats the adapter as having
/// returned nothing.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{provider}: request failed: {message}")]
    Transport { provider: Provider, message: String },

    #[error("{provider}: request timed out")]
    Timeout { provider: Provider },

    #[error("{provider}: rate limit exceeded")]
    RateLimited { provider: Provider },

    #[error("{provider}: HTTP {status}: {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("{provider}: failed to parse response: {message}")]
    Parse { provider: Provider, message: String },

    #[error("{provider}: API error: {message}")]
    Api { provider: Provider, message: String },

    #[error("{provider}: API key not configured")]
    MissingCredentials { provider: Provider },
}

impl FeedError {
    pub(crate) fn from_reqwest(provider: Provider, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout { provider }
        } else if err.is_decode() {
            FeedError::Parse {
                provider,
                message: err.to_string(),
            }
        } else {
            FeedError::Transport {
                provider,
                message: err.to_string(),
            }
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            FeedError::Transport { provider, .. }
            | FeedError::Timeout { provider }
            | FeedError::RateLimited { provider }
            | FeedError::Http { provider, .. }
            | FeedError::Parse { provider, .. }
            | FeedError::Api { provider, .. }
            | FeedError::MissingCredentials { provider } => *provider,
        }
    }

    /// Whether a paced sequential adapter should stop issuing requests for
    /// the rest of the cycle.
    pub fn halts_batch(&self) -> bool {
        matches!(
            self,
            FeedError::RateLimited { .. } | FeedError::MissingCredentials { .. }
        )
    }
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Errors loading the identifier-mapping document. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Identifier mapping not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read identifier mapping {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid identifier mapping: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Identifier mapping has no section for {0}")]
    MissingSection(Provider),

    #[error("Identifier mapping has an empty {provider} id for {coin}")]
    EmptyId { provider: Provider, coin: String },
}
