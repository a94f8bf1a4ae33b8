//! Configuration module for Window-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every tunable of the crawl lives here: the remote area, target record count,
//! page size, saturation thresholds, window granularity, cooldowns and pacing.
//!
//! # Example
//!
//! ```no_run
//! use window_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting up to {} records", config.crawl.target);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, CrawlConfig, OutputConfig, SaturationConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
