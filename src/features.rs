//! Calendar features for the forecast model.
//!
//! The model was trained on exactly these columns, in this order:
//! `[dayofweek, week, month, day, is_weekend]` with Monday = 0.

use chrono::{Datelike, NaiveDate, Weekday};
use nalgebra::DMatrix;

use crate::domain::CanonicalTable;

/// Feature column names, in model order.
pub const FEATURE_COLUMNS: [&str; 5] = ["dayofweek", "week", "month", "day", "is_weekend"];

/// A `(period, group)` pair to build features for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesKey {
    pub period: NaiveDate,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    pub period: NaiveDate,
    pub group: String,
    /// 0 = Monday .. 6 = Sunday.
    pub dayofweek: u32,
    /// ISO week number.
    pub week: u32,
    pub month: u32,
    pub day: u32,
    pub is_weekend: u32,
}

impl FeatureRow {
    pub fn from_date(period: NaiveDate, group: impl Into<String>) -> Self {
        let weekday = period.weekday();
        Self {
            period,
            group: group.into(),
            dayofweek: weekday.num_days_from_monday(),
            week: period.iso_week().week(),
            month: period.month(),
            day: period.day(),
            is_weekend: u32::from(matches!(weekday, Weekday::Sat | Weekday::Sun)),
        }
    }

    /// Values in [`FEATURE_COLUMNS`] order.
    pub fn values(&self) -> [f64; 5] {
        [
            f64::from(self.dayofweek),
            f64::from(self.week),
            f64::from(self.month),
            f64::from(self.day),
            f64::from(self.is_weekend),
        ]
    }
}

/// Build feature rows for `rows`. Pure; input order is kept.
pub fn features(rows: &[SeriesKey]) -> Vec<FeatureRow> {
    rows.iter()
        .map(|k| FeatureRow::from_date(k.period, k.group.clone()))
        .collect()
}

/// Stack feature rows into a `rows x 5` matrix.
pub fn feature_matrix(rows: &[FeatureRow]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), FEATURE_COLUMNS.len(), |i, j| rows[i].values()[j])
}

/// Features of every dated row of `table`, paired with the observed ratio.
pub fn history_features(table: &CanonicalTable) -> Vec<(FeatureRow, Option<f64>)> {
    table
        .dated_rows()
        .map(|(period, row)| (FeatureRow::from_date(period, row.group.clone()), row.ratio))
        .collect()
}
