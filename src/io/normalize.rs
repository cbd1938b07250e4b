//! Schema normalization of provider responses.
//!
//! This module turns the fragments returned by every successful batch into a
//! single `period,group,ratio` table. Provider responses are not consistent
//! about column names (`period` vs `Date`, quoted keys, an unnamed numeric
//! value column, `*title*` instead of `group`), so the columns are resolved
//! with fixed, ordered rules:
//!
//! 1. concatenate every fragment; each row gets `group = fragment.title`
//! 2. strip whitespace and quotes from column names (merging collisions)
//! 3. date: leftmost column named `period`/`date` (any case) -> `period`
//! 4. ratio: `ratio`, else the leftmost numeric column that is not the date
//! 5. group: `group`, else the leftmost column whose name contains `title`
//!
//! "Leftmost" always means first in concatenation order. Cells that do not
//! parse become `None`; rows are not removed for that reason, consumers
//! filter on their side.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::domain::{CanonicalRow, CanonicalTable, NormalizeReport, RawSeriesFragment};
use crate::error::NormalizationError;
use crate::observe::{EventSink, Stage, StageEvent, emit};

/// A loosely typed table: named columns of raw JSON cells.
///
/// Every row has exactly `columns.len()` cells; absent values are `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut cells: Vec<Value>) {
        cells.resize(self.columns.len(), Value::Null);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Concatenate fragments from all batches into one table.
    ///
    /// Columns appear in first-seen order across fragments and data points,
    /// followed (at first use) by `group`, which carries each fragment's title.
    pub fn from_fragments(fragments_by_batch: &[Vec<RawSeriesFragment>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Vec<Value>> = Vec::new();

        let mut column_index = |name: &str, columns: &mut Vec<String>| -> usize {
            if let Some(&idx) = index.get(name) {
                return idx;
            }
            columns.push(name.to_string());
            index.insert(name.to_string(), columns.len() - 1);
            columns.len() - 1
        };

        for fragment in fragments_by_batch.iter().flatten() {
            for point in &fragment.data {
                let mut row = vec![Value::Null; columns.len()];
                for (key, value) in point {
                    let idx = column_index(key.as_str(), &mut columns);
                    if idx >= row.len() {
                        row.resize(idx + 1, Value::Null);
                    }
                    row[idx] = value.clone();
                }
                let idx = column_index("group", &mut columns);
                if idx >= row.len() {
                    row.resize(idx + 1, Value::Null);
                }
                row[idx] = Value::String(fragment.title.clone());
                rows.push(row);
            }
        }

        for row in &mut rows {
            row.resize(columns.len(), Value::Null);
        }

        Self { columns, rows }
    }

    fn drop_column(&mut self, idx: usize) {
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
    }
}

/// Normalize the fragments of all successful batches.
pub fn normalize(
    fragments_by_batch: &[Vec<RawSeriesFragment>],
    sink: Option<&dyn EventSink>,
) -> Result<CanonicalTable, NormalizationError> {
    normalize_table(RawTable::from_fragments(fragments_by_batch), sink)
}

/// Normalize an already-concatenated table.
pub fn normalize_table(
    raw: RawTable,
    sink: Option<&dyn EventSink>,
) -> Result<CanonicalTable, NormalizationError> {
    let raw_columns = raw.columns.clone();
    let mut table = clean_columns(raw);
    let cleaned_columns = table.columns.clone();
    emit(
        sink,
        StageEvent::ok(Stage::Normalize, format!("sanitized columns: {cleaned_columns:?}"))
            .count("rows", table.rows.len())
            .count("columns", cleaned_columns.len()),
    );

    // Date column.
    let date_idx = table
        .columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case("period") || c.eq_ignore_ascii_case("date"))
        .ok_or_else(|| {
            emit(sink, StageEvent::failed(Stage::Normalize, "no period/date column"));
            NormalizationError::MissingDateColumn {
                columns: table.columns.clone(),
            }
        })?;
    let date_source = table.columns[date_idx].clone();
    let date_idx = rename_column(&mut table, date_idx, "period", sink);
    let periods: Vec<Option<NaiveDate>> = table.rows.iter().map(|r| parse_period(&r[date_idx])).collect();

    // Ratio column.
    let (ratio_idx, ratio_source) = match table.columns.iter().position(|c| c == "ratio") {
        Some(idx) => (idx, "ratio".to_string()),
        None => {
            let idx = (0..table.columns.len())
                .filter(|&i| i != date_idx)
                .find(|&i| is_numeric_column(&table, i))
                .ok_or_else(|| {
                    emit(sink, StageEvent::failed(Stage::Normalize, "no ratio or numeric column"));
                    NormalizationError::MissingRatioColumn {
                        columns: table.columns.clone(),
                    }
                })?;
            let source = table.columns[idx].clone();
            (rename_column(&mut table, idx, "ratio", sink), source)
        }
    };
    let ratios: Vec<Option<f64>> = table.rows.iter().map(|r| parse_ratio(&r[ratio_idx])).collect();

    // Group column.
    let group_idx = match table.columns.iter().position(|c| c == "group") {
        Some(idx) => idx,
        None => table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx && *i != ratio_idx)
            .find(|(_, c)| c.to_lowercase().contains("title"))
            .map(|(i, _)| i)
            .ok_or_else(|| {
                emit(sink, StageEvent::failed(Stage::Normalize, "no group/title column"));
                NormalizationError::MissingGroupColumn {
                    columns: table.columns.clone(),
                }
            })?,
    };
    let group_source = table.columns[group_idx].clone();

    let rows_in = table.rows.len();
    let mut rows = Vec::with_capacity(rows_in);
    let mut dropped_empty_group = 0usize;
    for ((cells, period), ratio) in table.rows.iter().zip(periods).zip(ratios) {
        let group = cell_text(&cells[group_idx]);
        if group.trim().is_empty() {
            dropped_empty_group += 1;
            continue;
        }
        rows.push(CanonicalRow { period, group, ratio });
    }

    let null_periods = rows.iter().filter(|r| r.period.is_none()).count();
    let null_ratios = rows.iter().filter(|r| r.ratio.is_none()).count();

    if !rows.is_empty() && null_periods == rows.len() {
        emit(sink, StageEvent::failed(Stage::Normalize, "no parseable dates"));
        return Err(NormalizationError::UnparsableDates {
            column: date_source,
            rows: rows.len(),
        });
    }
    if !rows.is_empty() && null_ratios == rows.len() {
        emit(sink, StageEvent::failed(Stage::Normalize, "no numeric ratios"));
        return Err(NormalizationError::UnresolvableRatios {
            column: ratio_source,
            rows: rows.len(),
        });
    }
    if null_periods > 0 || dropped_empty_group > 0 {
        emit(
            sink,
            StageEvent::warn(Stage::Normalize, "rows with unparseable dates or empty groups")
                .count("null_periods", null_periods)
                .count("dropped_empty_group", dropped_empty_group),
        );
    }

    let report = NormalizeReport {
        raw_columns,
        cleaned_columns,
        date_source,
        ratio_source,
        group_source,
        rows_in,
        null_periods,
        null_ratios,
        dropped_empty_group,
    };

    emit(
        sink,
        StageEvent::ok(Stage::Normalize, "normalized trend table")
            .count("rows", rows.len())
            .count("null_periods", null_periods)
            .count("null_ratios", null_ratios),
    );

    Ok(CanonicalTable::new(rows, report))
}

/// Strip surrounding whitespace and quote characters from a column name.
///
/// Handles names like `'"period"'` or ` "ratio" `.
pub fn clean_column_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'')
        .to_string()
}

/// Clean every column name; columns that collide after cleaning are merged
/// into the leftmost one, keeping its cell unless that cell is null.
fn clean_columns(raw: RawTable) -> RawTable {
    let mut columns: Vec<String> = Vec::new();
    let mut target: Vec<usize> = Vec::with_capacity(raw.columns.len());
    for name in &raw.columns {
        let cleaned = clean_column_name(name);
        match columns.iter().position(|c| *c == cleaned) {
            Some(idx) => target.push(idx),
            None => {
                columns.push(cleaned);
                target.push(columns.len() - 1);
            }
        }
    }

    let rows = raw
        .rows
        .into_iter()
        .map(|cells| {
            let mut out = vec![Value::Null; columns.len()];
            for (cell, &idx) in cells.into_iter().zip(&target) {
                if out[idx].is_null() {
                    out[idx] = cell;
                }
            }
            out
        })
        .collect();

    RawTable { columns, rows }
}

/// Rename column `idx` to `name`, dropping any other column that already has
/// that name. Returns the (possibly shifted) index of the renamed column.
fn rename_column(table: &mut RawTable, idx: usize, name: &str, sink: Option<&dyn EventSink>) -> usize {
    if table.columns[idx] == name {
        return idx;
    }
    let mut idx = idx;
    if let Some(shadowed) = table.columns.iter().position(|c| c == name) {
        emit(
            sink,
            StageEvent::warn(
                Stage::Normalize,
                format!("dropping column '{name}' shadowed by '{}'", table.columns[idx]),
            ),
        );
        table.drop_column(shadowed);
        if shadowed < idx {
            idx -= 1;
        }
    }
    emit(
        sink,
        StageEvent::ok(Stage::Normalize, format!("'{}' -> '{name}'", table.columns[idx])),
    );
    table.columns[idx] = name.to_string();
    idx
}

/// A column is numeric when every non-null cell is a JSON number and there is
/// at least one such cell.
fn is_numeric_column(table: &RawTable, idx: usize) -> bool {
    let mut any = false;
    for row in &table.rows {
        match &row[idx] {
            Value::Null => {}
            Value::Number(_) => any = true,
            _ => return false,
        }
    }
    any
}

/// Parse a provider date cell.
///
/// Accepts ISO dates, a few common separators, compact `YYYYMMDD` (string or
/// integer), month-first `MM/DD/YYYY` and timestamps (date part only).
/// Years below 1000 are rejected.
pub fn parse_period(cell: &Value) -> Option<NaiveDate> {
    match cell {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n.as_u64().and_then(|v| parse_date_str(&v.to_string())),
        _ => None,
    }
}

/// Years below this are two-digit or truncated years, not real dates.
const MIN_YEAR: i32 = 1000;

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    parse_date_any(s).filter(|d| d.year() >= MIN_YEAR)
}

/// Slash and dash forms with the year last are month-first.
fn parse_date_any(s: &str) -> Option<NaiveDate> {
    const DATE_FMTS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y", "%m-%d-%Y"];
    const DATETIME_FMTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Coerce a cell to a finite float: numbers and numeric strings only.
pub fn parse_ratio(cell: &Value) -> Option<f64> {
    let v = match cell {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
