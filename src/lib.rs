//! Window-Harvest: an adaptive time-window harvester for paginated search APIs
//!
//! This crate crawls a windowed, rate-limited REST search endpoint until a
//! target record count is reached or the time range is exhausted. Saturated
//! windows are bisected until every window can be paginated to completion, and
//! every record lands in an idempotent SQLite checkpoint.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod window;

use thiserror::Error;

/// Main error type for Window-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Window-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::WindowState;
pub use storage::Record;
pub use window::{SaturationDetector, TimeWindow};
