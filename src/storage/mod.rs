//! Storage module for the durable record checkpoint
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent, durable record insertion keyed by identity
//! - Snapshots of the full record set for export
//! - Run bookkeeping for statistics
//!
//! The record table is the only checkpoint. Re-running against the same
//! database resumes by virtue of first-write-wins inserts.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RecordStore, SharedStore, StorageError, StorageResult};

use crate::HarvestError;
use serde_json::Value;
use std::path::Path;

/// Opens or creates a record store
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// A harvested document, keyed by its external identity
///
/// The payload is the complete JSON object returned by the API, with no
/// field projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub identity: String,
    pub payload: Value,
}

impl Record {
    /// Builds a record from a raw API item
    ///
    /// Returns `None` when the item is not an object or has no usable `id`.
    /// String ids are taken as-is; integer ids are rendered in decimal.
    pub fn from_item(item: Value) -> Option<Self> {
        let identity = match item.as_object()?.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            identity,
            payload: item,
        })
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub target: u64,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Window and record tallies of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub drained_windows: u64,
    pub partial_windows: u64,
    pub split_windows: u64,
    pub dropped_windows: u64,
    pub records_inserted: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_record_from_string_id() {
        let record = Record::from_item(json!({"id": "93311", "name": "Rust developer"})).unwrap();
        assert_eq!(record.identity, "93311");
        assert_eq!(record.payload["name"], "Rust developer");
    }

    #[test]
    fn test_record_from_numeric_id() {
        let record = Record::from_item(json!({"id": 42})).unwrap();
        assert_eq!(record.identity, "42");
    }

    #[test]
    fn test_record_without_identity_is_rejected() {
        assert!(Record::from_item(json!({"name": "no id"})).is_none());
        assert!(Record::from_item(json!({"id": ""})).is_none());
        assert!(Record::from_item(json!({"id": null})).is_none());
        assert!(Record::from_item(json!(["not", "an", "object"])).is_none());
    }

    #[test]
    fn test_record_keeps_nested_fields() {
        let item = json!({
            "id": "1",
            "salary": {"from": 300000, "to": null, "currency": "KZT"},
            "key_skills": [{"name": "Rust"}]
        });
        let record = Record::from_item(item.clone()).unwrap();
        assert_eq!(record.payload, item);
    }
}
