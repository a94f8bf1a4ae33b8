//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::storage::{Record, RunRecord, RunStatus, RunTotals};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Unknown run status: {0}")]
    UnknownRunStatus(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A record store shared between the scheduler, the coordinator and the exporter
///
/// Every read and write goes through the one lock, so `size()` always reflects
/// completed inserts.
pub type SharedStore = Arc<Mutex<dyn RecordStore + Send>>;

/// Trait for record store implementations
///
/// Inserts are idempotent (first write wins) and durable before they return,
/// which makes the store itself a valid crawl checkpoint.
pub trait RecordStore {
    // ===== Records =====

    /// Inserts every record whose identity is not yet stored
    ///
    /// Returns the number of genuinely new records. The whole batch is
    /// committed before this returns.
    fn insert_many(&mut self, records: &[Record]) -> StorageResult<usize>;

    /// Current number of distinct records
    fn size(&self) -> StorageResult<u64>;

    /// Whether a record with this identity is stored
    fn contains_identity(&self, identity: &str) -> StorageResult<bool>;

    /// Every stored record, ordered by identity
    fn snapshot_all(&self) -> StorageResult<Vec<Record>>;

    // ===== Run Management =====

    /// Creates a new run in the `running` state
    fn create_run(&mut self, config_hash: &str, target: u64) -> StorageResult<i64>;

    /// Records the final status and tallies of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Counts all runs ever made against this store
    fn count_runs(&self) -> StorageResult<u64>;
}
