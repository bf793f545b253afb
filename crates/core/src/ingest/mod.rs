//! Flat-file market history: read, diagnose, clean.

mod clean;
mod csv_history;
pub mod types;

pub use clean::{clean, diagnose};
pub use csv_history::{read_history_csv, read_history_from_reader};

use crate::domain::history::HistoricalRecord;
use anyhow::Result;
use std::path::Path;

/// Reads and cleans a history CSV, logging its diagnostics.
pub fn load_history(path: &Path) -> Result<Vec<HistoricalRecord>> {
    let raw = read_history_csv(path)?;
    let diag = diagnose(&raw);
    tracing::info!(
        path = %path.display(),
        rows = diag.n_rows,
        first_date = ?diag.first_date,
        last_date = ?diag.last_date,
        missing = ?diag.missing,
        "history loaded"
    );
    clean(raw)
}
