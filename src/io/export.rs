//! CSV exports of the trend table, its features, and forecasts.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. Nulls are written as empty cells.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{CanonicalTable, ForecastRow};
use crate::features::{FEATURE_COLUMNS, history_features};
use crate::error::AppError;

/// Write the canonical `period,group,ratio` table.
pub fn write_table_csv(path: &Path, table: &CanonicalTable) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "period,group,ratio").map_err(write_err)?;
    for row in table.rows() {
        writeln!(
            file,
            "{},{},{}",
            row.period.map(|d| d.to_string()).unwrap_or_default(),
            csv_field(&row.group),
            row.ratio.map(|v| v.to_string()).unwrap_or_default(),
        )
        .map_err(write_err)?;
    }
    file.flush().map_err(write_err)
}

/// Write calendar features of every dated row next to its observed ratio.
pub fn write_features_csv(path: &Path, table: &CanonicalTable) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "period,group,{},ratio", FEATURE_COLUMNS.join(",")).map_err(write_err)?;
    for (f, ratio) in history_features(table) {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            f.period,
            csv_field(&f.group),
            f.dayofweek,
            f.week,
            f.month,
            f.day,
            f.is_weekend,
            ratio.map(|v| v.to_string()).unwrap_or_default(),
        )
        .map_err(write_err)?;
    }
    file.flush().map_err(write_err)
}

/// Write forecasts, one row per group with a `pred_{d}d` column per offset.
pub fn write_forecast_csv(path: &Path, rows: &[ForecastRow], offsets: &[u32]) -> Result<(), AppError> {
    let mut file = create(path)?;
    let header: Vec<String> = offsets.iter().map(|d| format!("pred_{d}d")).collect();
    writeln!(file, "group,last_day,{}", header.join(",")).map_err(write_err)?;
    for row in rows {
        let values: Vec<String> = offsets
            .iter()
            .map(|d| row.prediction(*d).map(|v| format!("{v:.6}")).unwrap_or_default())
            .collect();
        writeln!(file, "{},{},{}", csv_field(&row.group), row.last_day, values.join(",")).map_err(write_err)?;
    }
    file.flush().map_err(write_err)
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::new(4, format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_err(e: std::io::Error) -> AppError {
    AppError::new(4, format!("Failed to write export CSV: {e}"))
}

/// Quote a field when it contains a delimiter, quote, or line break.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
