//! Statistics from the record store
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::output::traits::OutputResult;
use crate::storage::{RecordStore, RunRecord};

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Distinct records in the store
    pub store_size: u64,

    /// Runs ever made against this store
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn RecordStore) -> OutputResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        store_size: storage.size()?,
        total_runs: storage.count_runs()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Records stored: {}", stats.store_size);
    println!("  Runs: {}", stats.total_runs);
    println!();

    let run = match &stats.latest_run {
        Some(run) => run,
        None => {
            println!("No runs recorded yet.");
            return;
        }
    };

    println!("Latest Run (#{}):", run.id);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    println!(
        "  Finished: {}",
        run.finished_at.as_deref().unwrap_or("(not finished)")
    );
    println!("  Config hash: {}", run.config_hash);
    println!();

    println!("Windows:");
    println!("  Drained: {}", run.totals.drained_windows);
    println!("  Partial: {}", run.totals.partial_windows);
    println!("  Split: {}", run.totals.split_windows);
    println!("  Dropped: {}", run.totals.dropped_windows);
    println!();

    let progress = if run.target > 0 {
        (stats.store_size as f64 / run.target as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "New records: {}, store at {:.1}% of target ({} / {})",
        run.totals.records_inserted,
        progress.min(100.0),
        stats.store_size,
        run.target
    );
}
