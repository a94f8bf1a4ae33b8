//! CSV export of the record store
//!
//! Every stored record becomes one row. The header is the sorted union of all
//! top-level payload keys, so records with different shapes line up.

use crate::output::traits::{ExportSummary, OutputError, OutputResult};
use crate::storage::{Record, RecordStore};
use serde_json::Value;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes every record in `store` to `path`
///
/// The file is written next to `path` under a `.tmp` suffix and renamed into
/// place once complete.
pub fn export_csv(store: &dyn RecordStore, path: &Path) -> OutputResult<ExportSummary> {
    let records = store.snapshot_all()?;
    let columns = collect_columns(&records);

    let tmp_path = temp_path(path);
    if let Err(e) = write_rows(&records, &columns, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;

    tracing::debug!(
        "Exported {} rows x {} columns to {}",
        records.len(),
        columns.len(),
        path.display()
    );

    Ok(ExportSummary {
        rows: records.len(),
        columns: columns.len(),
        path: path.to_path_buf(),
    })
}

/// Renders one payload field as a CSV cell
///
/// Strings are written verbatim and null as an empty cell. Nested objects and
/// arrays are written as compact JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn collect_columns(records: &[Record]) -> Vec<String> {
    let columns: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.payload.as_object())
        .flat_map(|fields| fields.keys().map(String::as_str))
        .collect();
    columns.into_iter().map(str::to_string).collect()
}

fn write_rows(records: &[Record], columns: &[String], path: &Path) -> OutputResult<()> {
    if columns.is_empty() {
        fs::File::create(path)?.sync_all()?;
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;

    for record in records {
        let fields = record.payload.as_object();
        let row = columns.iter().map(|column| {
            fields
                .and_then(|f| f.get(column))
                .map(render_cell)
                .unwrap_or_default()
        });
        writer.write_record(row)?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| OutputError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
