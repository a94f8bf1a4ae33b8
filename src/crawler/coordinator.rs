//! Harvest coordinator - top-level run orchestration
//!
//! This module wires the pieces of one harvest together:
//! - Opening the record store and recording the run
//! - Building the API client and the window scheduler
//! - Handing the scheduler a cancellation token owned by the shutdown handler
//! - Exporting the store once the scheduler returns, however it stopped
//! - Finishing the run record with its tallies

use crate::config::Config;
use crate::crawler::fetcher::SearchClient;
use crate::crawler::scheduler::{CrawlReport, ScheduleSettings, StopReason, WindowScheduler};
use crate::crawler::shutdown::ShutdownCoordinator;
use crate::output::{export_csv, ExportSummary};
use crate::storage::{open_storage, RunStatus, RunTotals, SharedStore, StorageError};
use crate::HarvestError;
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Everything a finished harvest produced
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub report: CrawlReport,
    pub export: ExportSummary,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    store: SharedStore,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Coordinator {
    /// Opens the configured database and prepares a harvest
    pub fn new(
        config: Config,
        config_hash: String,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Result<Self, HarvestError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Ok(Self::with_store(
            config,
            config_hash,
            Arc::new(Mutex::new(storage)),
            shutdown,
        ))
    }

    pub fn with_store(
        config: Config,
        config_hash: String,
        store: SharedStore,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            config,
            config_hash,
            store,
            shutdown,
        }
    }

    /// Runs one harvest to completion
    ///
    /// The export runs whether the target was reached, the range was
    /// exhausted, or a stop was requested. A store failure marks the run as
    /// failed with the tallies gathered so far, still attempts an export, and
    /// is returned as the error.
    pub async fn run(&self) -> Result<HarvestOutcome, HarvestError> {
        let range = self.config.crawl.scan_range(Utc::now())?;
        let settings = ScheduleSettings::from_config(&self.config)?;
        let target = self.config.crawl.target;

        let run_id = {
            let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
            store.create_run(&self.config_hash, target)?
        };
        tracing::info!("Starting harvest run {}", run_id);

        let client = SearchClient::new(&self.config.api, &self.config.user_agent)?;
        let mut scheduler = WindowScheduler::new(
            client,
            self.store.clone(),
            self.config.saturation.detector(),
            settings,
            self.shutdown.token(),
        );

        let report = match scheduler.run(range, target).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Harvest run {} failed: {}", run_id, e);
                let totals = scheduler
                    .last_report()
                    .map(CrawlReport::totals)
                    .unwrap_or_default();
                if let Err(finish_err) = self.finish(run_id, RunStatus::Failed, &totals) {
                    tracing::error!("Could not record failed run: {}", finish_err);
                }
                if let Err(export_err) = self.export() {
                    tracing::error!("Export after failure also failed: {}", export_err);
                }
                return Err(e);
            }
        };

        let status = match report.stop_reason {
            StopReason::StopRequested => RunStatus::Interrupted,
            StopReason::TargetReached | StopReason::QueueExhausted => RunStatus::Completed,
        };

        let export = self.export()?;
        self.finish(run_id, status, &report.totals())?;
        self.shutdown.mark_graceful_exit();

        tracing::info!(
            "Harvest {} ({}): {} records stored (target {}), {} new this run, exported to {}",
            status.to_db_string(),
            report.stop_reason,
            report.store_size,
            report.target,
            report.records_inserted,
            export.path.display()
        );
        tracing::info!(
            "Windows: {} drained, {} partial, {} split, {} dropped, {} truncated; throttled {} times, banned {} times",
            report.drained,
            report.partial,
            report.split,
            report.dropped,
            report.truncated,
            report.rate_limited,
            report.banned
        );

        Ok(HarvestOutcome {
            run_id,
            status,
            report,
            export,
        })
    }

    /// Writes the current store contents to the configured CSV path
    pub fn export(&self) -> Result<ExportSummary, HarvestError> {
        let store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        let summary = export_csv(&*store, Path::new(&self.config.output.export_path))?;
        Ok(summary)
    }

    fn finish(&self, run_id: i64, status: RunStatus, totals: &RunTotals) -> Result<(), HarvestError> {
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        store.finish_run(run_id, status, totals)?;
        Ok(())
    }
}

/// Runs a complete harvest with Ctrl+C handling
///
/// The first Ctrl+C stops the scheduler at its next safe point and the export
/// still runs. A second Ctrl+C terminates the process without exporting.
///
/// # Example
///
/// ```no_run
/// use window_harvest::config::load_config_with_hash;
/// use window_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let outcome = run_crawl(config, hash).await?;
/// println!("{} records", outcome.report.store_size);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, config_hash: String) -> Result<HarvestOutcome, HarvestError> {
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let listener = shutdown.listen_for_signals();

    let result = match Coordinator::new(config, config_hash, shutdown) {
        Ok(coordinator) => coordinator.run().await,
        Err(e) => Err(e),
    };

    listener.abort();
    result
}

/// Re-exports an existing store without crawling
pub fn export_only(config: &Config) -> Result<ExportSummary, HarvestError> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let summary = export_csv(&storage, Path::new(&config.output.export_path))?;
    Ok(summary)
}
