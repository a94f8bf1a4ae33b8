//! Crawler module for windowed harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Paged, windowed API fetching with outcome classification
//! - Adaptive window scheduling with saturation bisection and backoff
//! - Ctrl+C handling through a cancellation token
//! - Overall run coordination and export

mod coordinator;
mod fetcher;
mod scheduler;
pub mod shutdown;

pub use coordinator::{export_only, run_crawl, Coordinator, HarvestOutcome};
pub use fetcher::{
    build_http_client, classify_response, parse_page, FetchFailure, FetchOutcome, PageQuery,
    PageResult, PageSource, SearchClient,
};
pub use scheduler::{CrawlReport, ScheduleSettings, StopReason, WindowScheduler};
pub use shutdown::{ShutdownCoordinator, ShutdownPhase, SignalAction, FORCED_EXIT_CODE};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Open the record store
/// 2. Record a new run
/// 3. Build the HTTP client
/// 4. Bisect and drain windows until the target or the range is exhausted
/// 5. Export the store to CSV
pub async fn harvest(config: Config, config_hash: String) -> Result<HarvestOutcome, HarvestError> {
    run_crawl(config, config_hash).await
}
