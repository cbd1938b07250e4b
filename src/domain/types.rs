//! Shared domain types.
//!
//! These types flow through every stage:
//!
//! - request planning (`KeywordGroup`, `Batch`, `DateRange`)
//! - provider payloads (`RawSeriesFragment`)
//! - the normalized time series (`CanonicalRow`, `CanonicalTable`)
//! - forecasts (`ForecastRow`)

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider limit on keywords per group.
pub const MAX_GROUP_SIZE: usize = 20;

/// Provider limit on groups per request.
pub const MAX_CHUNK_SIZE: usize = 5;

/// A named cluster of keywords evaluated together as one series.
///
/// The name is always the first member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    name: String,
    members: Vec<String>,
}

impl KeywordGroup {
    /// Build a group from its members. Returns `None` for an empty slice.
    pub fn new(members: Vec<String>) -> Option<Self> {
        let name = members.first()?.clone();
        Some(Self { name, members })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }
}

/// Groups submitted together in one provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub groups: Vec<KeywordGroup>,
}

impl Batch {
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(KeywordGroup::name).collect()
    }

    pub fn keyword_count(&self) -> usize {
        self.groups.iter().map(|g| g.members().len()).sum()
    }
}

/// Inclusive calendar date range for a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The `days`-day lookback window ending at `end`; `None` when the start
    /// would fall outside the representable calendar.
    pub fn lookback(end: NaiveDate, days: u32) -> Option<Self> {
        let start = end.checked_sub_days(chrono::Days::new(u64::from(days)))?;
        Some(Self { start, end })
    }

    /// All dates in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// One series in a provider response.
///
/// Data points are kept as raw JSON objects because their key names differ
/// between provider versions (`period` vs `date`, `ratio` vs something else).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeriesFragment {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

/// A normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRow {
    /// `None` when the provider value did not parse as a date.
    pub period: Option<NaiveDate>,
    pub group: String,
    /// `None` when the provider value was not numeric.
    pub ratio: Option<f64>,
}

/// How the normalizer resolved the provider columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    /// Column names as they arrived (after concatenation).
    pub raw_columns: Vec<String>,
    /// Column names after whitespace/quote stripping and merging.
    pub cleaned_columns: Vec<String>,
    /// Source column renamed to `period`.
    pub date_source: String,
    /// Source column renamed to `ratio`.
    pub ratio_source: String,
    /// Source column renamed to `group`.
    pub group_source: String,
    pub rows_in: usize,
    pub null_periods: usize,
    pub null_ratios: usize,
    /// Rows removed because their group value was empty.
    pub dropped_empty_group: usize,
}

/// The normalized `period,group,ratio` table.
///
/// Immutable once built: downstream consumers get shared references (or
/// clones) and filter on their side. Rows with a null `period` are retained
/// for diagnostics; use [`CanonicalTable::dated_rows`] for charting and
/// forecasting.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    rows: Vec<CanonicalRow>,
    report: NormalizeReport,
}

impl CanonicalTable {
    pub(crate) fn new(rows: Vec<CanonicalRow>, report: NormalizeReport) -> Self {
        Self { rows, report }
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with a parsed period, paired with that date.
    pub fn dated_rows(&self) -> impl Iterator<Item = (NaiveDate, &CanonicalRow)> {
        self.rows.iter().filter_map(|r| r.period.map(|p| (p, r)))
    }

    /// Distinct group names in first-appearance order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|r| r.group.as_str())
            .filter(|g| seen.insert(*g))
            .collect()
    }

    /// Latest parsed period for `group`.
    pub fn last_period(&self, group: &str) -> Option<NaiveDate> {
        self.rows
            .iter()
            .filter(|r| r.group == group)
            .filter_map(|r| r.period)
            .max()
    }

    /// Earliest and latest parsed period over the whole table.
    pub fn period_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.rows.iter().filter_map(|r| r.period);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

/// Offset forecasts for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub group: String,
    /// Date the forecasts are anchored on (latest observed period).
    pub last_day: NaiveDate,
    /// `(offset_days, prediction)` in ascending offset order.
    pub predictions: Vec<(u32, f64)>,
}

impl ForecastRow {
    pub fn prediction(&self, offset_days: u32) -> Option<f64> {
        self.predictions
            .iter()
            .find(|(d, _)| *d == offset_days)
            .map(|(_, v)| *v)
    }

    /// Always `Some` when forecasting with the default offsets (3 and 7).
    pub fn pred_3d(&self) -> Option<f64> {
        self.prediction(3)
    }

    /// See [`ForecastRow::pred_3d`].
    pub fn pred_7d(&self) -> Option<f64> {
        self.prediction(7)
    }
}

/// Where trend data comes from for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Live provider API.
    Naver { endpoint: Option<String> },
    /// Deterministic offline data.
    Synthetic { seed: u64 },
    /// A raw capture saved by an earlier run.
    Capture { path: PathBuf },
}

/// A collection run's configuration, resolved from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub keywords: Vec<String>,
    pub range: DateRange,
    pub chunk_size: usize,
    pub group_size: usize,
    pub source: SourceKind,
    pub top_n: usize,
    pub export_table: Option<PathBuf>,
    pub export_features: Option<PathBuf>,
    pub save_raw: Option<PathBuf>,
}

/// Forecast step configuration.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub model_path: PathBuf,
    pub offsets: Vec<u32>,
    pub export_forecast: Option<PathBuf>,
}
