//! Reporting utilities: per-group summaries and rankings.
//!
//! Terminal formatting lives in `format`.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::domain::{CanonicalTable, ForecastRow};

pub mod format;

pub use format::*;

/// Observed ratios of one group, in period order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub group: String,
    pub series: Vec<(NaiveDate, f64)>,
}

impl GroupSummary {
    pub fn min(&self) -> Option<f64> {
        self.series.iter().map(|(_, v)| *v).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.series.iter().map(|(_, v)| *v).reduce(f64::max)
    }

    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.series.last().copied()
    }
}

/// One summary per group (first-appearance order), skipping rows without a
/// period or ratio.
pub fn summarize_groups(table: &CanonicalTable) -> Vec<GroupSummary> {
    table
        .groups()
        .into_iter()
        .map(|group| {
            let mut series: Vec<(NaiveDate, f64)> = table
                .dated_rows()
                .filter(|(_, r)| r.group == group)
                .filter_map(|(p, r)| r.ratio.map(|v| (p, v)))
                .collect();
            series.sort_by_key(|(p, _)| *p);
            GroupSummary {
                group: group.to_string(),
                series,
            }
        })
        .collect()
}

/// Groups ranked by ratio on the table's latest date (descending, top N).
///
/// Returns `None` when no row has a period.
pub fn rank_latest(table: &CanonicalTable, top_n: usize) -> Option<(NaiveDate, Vec<(String, f64)>)> {
    let (_, latest) = table.period_range()?;
    let mut ranked: Vec<(String, f64)> = table
        .dated_rows()
        .filter(|(p, _)| *p == latest)
        .filter_map(|(_, r)| r.ratio.map(|v| (r.group.clone(), v)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_n);
    Some((latest, ranked))
}

/// Forecast rows sorted by the prediction at `offset` (descending, top N).
pub fn rank_forecasts(rows: &[ForecastRow], offset: u32, top_n: usize) -> Vec<ForecastRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let (a, b) = (a.prediction(offset), b.prediction(offset));
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::normalize::{RawTable, normalize_table};
    use serde_json::json;

    fn table() -> CanonicalTable {
        let mut raw = RawTable::new(vec!["period".into(), "ratio".into(), "group".into()]);
        for (p, r, g) in [
            ("2025-05-02", json!(40.0), "tea"),
            ("2025-05-01", json!(10.0), "tea"),
            ("2025-05-01", json!(70.0), "coffee"),
            ("2025-05-02", json!(90.0), "coffee"),
            ("2025-05-02", json!(null), "cocoa"),
            ("2025-05-02", json!(55.0), "matcha"),
        ] {
            raw.push_row(vec![json!(p), r, json!(g)]);
        }
        normalize_table(raw, None).unwrap()
    }

    #[test]
    fn summaries_are_sorted_by_period() {
        let summaries = summarize_groups(&table());
        assert_eq!(summaries[0].group, "tea");
        assert_eq!(summaries[0].series[0].1, 10.0);
        assert_eq!(summaries[0].min(), Some(10.0));
        assert_eq!(summaries[0].max(), Some(40.0));
        assert_eq!(summaries[0].latest().map(|(_, v)| v), Some(40.0));
        assert!(summaries[2].series.is_empty());
        assert_eq!(summaries[2].latest(), None);
    }

    #[test]
    fn latest_ranking_skips_null_ratios() {
        let (date, ranked) = rank_latest(&table(), 2).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        assert_eq!(ranked, [("coffee".to_string(), 90.0), ("matcha".to_string(), 55.0)]);
    }

    #[test]
    fn forecasts_rank_by_requested_offset() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let row = |g: &str, p3: f64, p7: f64| ForecastRow {
            group: g.to_string(),
            last_day: day,
            predictions: vec![(3, p3), (7, p7)],
        };
        let rows = vec![row("a", 1.0, 9.0), row("b", 5.0, 2.0), row("c", 3.0, 3.0)];

        let by3: Vec<String> = rank_forecasts(&rows, 3, 10).into_iter().map(|r| r.group).collect();
        assert_eq!(by3, ["b", "c", "a"]);
        let by7 = rank_forecasts(&rows, 7, 1);
        assert_eq!(by7[0].group, "a");
        assert_eq!(by7.len(), 1);
    }
}
