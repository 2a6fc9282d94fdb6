//! Monitoring engine.
//!
//! This crate provides:
//! - Threshold-crossing detection over a bounded price window
//! - Persistent per-coin history with atomic writes
//! - The run controller tying polling, detection and alerting together

pub mod detector;
pub mod error;
pub mod history;
pub mod monitor;

pub use detector::{evaluate, ChangeDetector, DetectorConfig};
pub use error::{HistoryError, MonitorError};
pub use history::{load_history, save_history, HistoryStore};
pub use monitor::{CycleReport, Monitor, MonitorConfig};
