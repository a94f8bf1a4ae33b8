use crate::window::{SaturationDetector, TimeWindow};
use crate::HarvestError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Window-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub crawl: CrawlConfig,
    pub saturation: SaturationConfig,
    pub output: OutputConfig,
}

/// Remote search API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Search endpoint, queried with GET
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Region identifier sent as the `area` parameter
    pub area: u32,

    /// Page size sent as `per_page`
    #[serde(rename = "per-page")]
    pub per_page: u32,

    /// Sort key sent as `order_by`
    #[serde(rename = "order-by", default = "default_order_by")]
    pub order_by: String,

    /// Upper bound for a single request round trip (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// Email address for API operators to reach us
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Stop once the store holds this many records
    pub target: u64,

    /// Size of the scan range ending now, used when no explicit range is set
    #[serde(rename = "lookback-days", default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Explicit start of the scan range
    #[serde(rename = "range-from", default)]
    pub range_from: Option<DateTime<Utc>>,

    /// Explicit end of the scan range
    #[serde(rename = "range-to", default)]
    pub range_to: Option<DateTime<Utc>>,

    /// Windows no longer than this are never split (minutes)
    #[serde(rename = "min-window-minutes")]
    pub min_window_minutes: u64,

    /// Delay after every successful request (milliseconds)
    #[serde(rename = "pacing-delay-ms")]
    pub pacing_delay_ms: u64,

    /// Sleep after HTTP 429 (milliseconds)
    #[serde(rename = "rate-limit-cooldown-ms")]
    pub rate_limit_cooldown_ms: u64,

    /// Sleep after HTTP 403 (milliseconds)
    #[serde(rename = "ban-cooldown-ms")]
    pub ban_cooldown_ms: u64,

    /// Retries for a throttled page after page 0 succeeded
    #[serde(rename = "max-page-retries", default = "default_max_page_retries")]
    pub max_page_retries: u32,
}

/// Saturation thresholds of the remote API
#[derive(Debug, Clone, Deserialize)]
pub struct SaturationConfig {
    /// Reported total at or above which a window is truncated
    #[serde(rename = "max-found")]
    pub max_found: u64,

    /// Reported page count at or above which a window is truncated
    #[serde(rename = "max-pages")]
    pub max_pages: u32,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the CSV export
    #[serde(rename = "export-path")]
    pub export_path: String,
}

fn default_order_by() -> String {
    "publication_time".to_string()
}

fn default_request_timeout() -> u64 {
    25
}

fn default_lookback_days() -> u32 {
    30
}

fn default_max_page_retries() -> u32 {
    3
}

impl CrawlConfig {
    /// Resolves the full scan range, anchoring a lookback range at `now`
    pub fn scan_range(&self, now: DateTime<Utc>) -> Result<TimeWindow, HarvestError> {
        match (self.range_from, self.range_to) {
            (Some(from), Some(to)) => TimeWindow::new(from, to),
            _ => {
                let from = ChronoDuration::try_days(i64::from(self.lookback_days))
                    .and_then(|lookback| now.checked_sub_signed(lookback))
                    .ok_or_else(|| {
                        HarvestError::InvalidWindow(format!(
                            "lookback of {} days is out of range",
                            self.lookback_days
                        ))
                    })?;
                TimeWindow::new(from, now)
            }
        }
    }

    pub fn min_window(&self) -> Result<ChronoDuration, HarvestError> {
        i64::try_from(self.min_window_minutes)
            .ok()
            .and_then(ChronoDuration::try_minutes)
            .ok_or_else(|| {
                HarvestError::InvalidWindow(format!(
                    "minimum window of {} minutes is out of range",
                    self.min_window_minutes
                ))
            })
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn ban_cooldown(&self) -> Duration {
        Duration::from_millis(self.ban_cooldown_ms)
    }
}

impl SaturationConfig {
    pub fn detector(&self) -> SaturationDetector {
        SaturationDetector::new(self.max_found, self.max_pages)
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (contact: email)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (contact: {})",
            self.crawler_name, self.crawler_version, self.contact_email
        )
    }
}
