//! Error types for history persistence and the run controller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing the price-history document.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced by a monitoring cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid monitor configuration: {0}")]
    Config(String),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl MonitorError {
    /// Returns true if continuing would risk acting on bad state.
    /// The repeating controller stops on fatal errors and keeps going
    /// otherwise.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::Config(_) | MonitorError::History(HistoryError::Corrupt { .. })
        )
    }
}
