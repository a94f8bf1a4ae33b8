//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{Record, RunRecord, RunStatus, RunTotals};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, target, status,
     drained_windows, partial_windows, split_windows, dropped_windows, records_inserted";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// `synchronous = FULL` makes every committed insert survive a crash of the
    /// process or the machine.
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(5)?;
    let status = RunStatus::from_db_string(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            Box::new(StorageError::UnknownRunStatus(status.clone())),
        )
    })?;

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        target: row.get::<_, i64>(4)? as u64,
        status,
        totals: RunTotals {
            drained_windows: row.get::<_, i64>(6)? as u64,
            partial_windows: row.get::<_, i64>(7)? as u64,
            split_windows: row.get::<_, i64>(8)? as u64,
            dropped_windows: row.get::<_, i64>(9)? as u64,
            records_inserted: row.get::<_, i64>(10)? as u64,
        },
    })
}

impl RecordStore for SqliteStorage {
    // ===== Records =====

    fn insert_many(&mut self, records: &[Record]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO records (identity, payload, inserted_at) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                let payload = serde_json::to_string(&record.payload)?;
                inserted += stmt.execute(params![record.identity, payload, now])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn size(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn contains_identity(&self, identity: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE identity = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn snapshot_all(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identity, payload FROM records ORDER BY identity")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(identity, payload)| -> StorageResult<Record> {
                Ok(Record {
                    identity,
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, target: u64) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, target, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                config_hash,
                target as i64,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, drained_windows = ?3,
             partial_windows = ?4, split_windows = ?5, dropped_windows = ?6,
             records_inserted = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                totals.drained_windows as i64,
                totals.partial_windows as i64,
                totals.split_windows as i64,
                totals.dropped_windows as i64,
                totals.records_inserted as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
