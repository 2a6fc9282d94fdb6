//! Persistent per-coin price history.
//!
//! The whole map lives in one JSON document keyed by coin. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! target, so a crash mid-write never leaves a truncated document behind.

use crate::error::HistoryError;
use pricewatch_core::HistoryMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Read the history document. A missing file is an empty map.
pub fn load_history(path: &Path) -> Result<HistoryMap, HistoryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No history at {}, starting fresh", path.display());
            return Ok(HistoryMap::new());
        }
        Err(source) => {
            return Err(HistoryError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|source| HistoryError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the history document atomically. Keys come out sorted.
pub fn save_history(path: &Path, histories: &HistoryMap) -> Result<(), HistoryError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source: std::io::Error| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut content = serde_json::to_vec_pretty(histories)?;
    content.push(b'\n');

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(&content).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Saved history for {} coins to {}", histories.len(), path.display());
    Ok(())
}

/// History document bound to a path and retention window.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Load and trim every history to the retention window.
    pub fn load(&self) -> Result<HistoryMap, HistoryError> {
        let mut histories = load_history(&self.path)?;
        let mut trimmed = 0;
        for history in histories.values_mut() {
            trimmed += history.truncate_front(self.capacity);
        }
        histories.retain(|_, history| !history.is_empty());
        if trimmed > 0 {
            debug!("Trimmed {} points beyond window {}", trimmed, self.capacity);
        }
        Ok(histories)
    }

    pub fn save(&self, histories: &HistoryMap) -> Result<(), HistoryError> {
        save_history(&self.path, histories)
    }
}
