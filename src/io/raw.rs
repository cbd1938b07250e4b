//! Read/write raw capture JSON files.
//!
//! A capture is the provider output of a collection run before
//! normalization: the date range plus the fragments of every successful
//! batch. Saving it lets a run be normalized and forecast again offline.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DateRange, RawSeriesFragment};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCapture {
    pub tool: String,
    pub range: DateRange,
    pub batches: Vec<Vec<RawSeriesFragment>>,
}

impl RawCapture {
    pub fn new(range: DateRange, batches: Vec<Vec<RawSeriesFragment>>) -> Self {
        Self {
            tool: "kwt".to_string(),
            range,
            batches,
        }
    }
}

/// Write a capture JSON file.
pub fn write_capture_json(path: &Path, capture: &RawCapture) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create capture JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, capture)
        .map_err(|e| AppError::new(4, format!("Failed to write capture JSON: {e}")))?;
    Ok(())
}

/// Read a capture JSON file.
pub fn read_capture_json(path: &Path) -> Result<RawCapture, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open capture JSON '{}': {e}", path.display())))?;
    let capture: RawCapture = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid capture JSON '{}': {e}", path.display())))?;
    Ok(capture)
}
