//! Conductor Core: job model, error taxonomy, configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConductorConfig, DataPaths, StoreBackend};
pub use error::{Error, Result};
pub use types::*;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
