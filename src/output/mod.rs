//! Output module for exports and reports
//!
//! This module handles:
//! - Exporting the record store to a flat CSV file
//! - Loading and printing store statistics

mod csv_export;
pub mod stats;
mod traits;

pub use csv_export::{export_csv, render_cell};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{ExportSummary, OutputError, OutputResult};
