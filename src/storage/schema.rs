//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Window-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested records, first write wins
CREATE TABLE IF NOT EXISTS records (
    identity TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    inserted_at TEXT NOT NULL
);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    target INTEGER NOT NULL,
    status TEXT NOT NULL,
    drained_windows INTEGER NOT NULL DEFAULT 0,
    partial_windows INTEGER NOT NULL DEFAULT 0,
    split_windows INTEGER NOT NULL DEFAULT 0,
    dropped_windows INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
