//! Offset forecasts per keyword group.
//!
//! For every group the latest observed date is pushed forward by each offset
//! (3 and 7 days by default), the calendar features of that future date are
//! built exactly as for historical rows, and the model is asked for one
//! prediction per offset.

use chrono::{Duration, NaiveDate};

use crate::domain::{CanonicalTable, ForecastRow};
use crate::error::TrendError;
use crate::features::{SeriesKey, feature_matrix, features};
use crate::models::Regressor;
use crate::observe::{EventSink, Stage, StageEvent, emit};

pub const DEFAULT_OFFSETS: [u32; 2] = [3, 7];

/// Sort, deduplicate, and check forecast offsets.
pub fn normalize_offsets(offsets: &[u32]) -> Result<Vec<u32>, String> {
    let mut out = offsets.to_vec();
    out.sort_unstable();
    out.dedup();
    if out.is_empty() {
        return Err("at least one forecast offset is required".to_string());
    }
    if out[0] == 0 {
        return Err("forecast offsets must be positive day counts".to_string());
    }
    Ok(out)
}

/// Forecast every group of `table` at each offset.
///
/// Groups are visited in first-appearance order. A group without any parsed
/// period cannot be anchored and is skipped; if no group remains the call
/// fails with [`TrendError::EmptyInput`].
pub fn forecast(
    table: &CanonicalTable,
    model: &dyn Regressor,
    offsets: &[u32],
    sink: Option<&dyn EventSink>,
) -> Result<Vec<ForecastRow>, TrendError> {
    let offsets = normalize_offsets(offsets).map_err(TrendError::InvalidOffsets)?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for group in table.groups() {
        let Some(last_day) = table.last_period(group) else {
            skipped += 1;
            emit(
                sink,
                StageEvent::warn(Stage::Forecast, format!("group '{group}' has no dated rows; skipped")),
            );
            continue;
        };

        let mut predictions = Vec::with_capacity(offsets.len());
        for &d in &offsets {
            let value = predict_at(model, group, future_date(last_day, d)?)?;
            predictions.push((d, value));
        }

        out.push(ForecastRow {
            group: group.to_string(),
            last_day,
            predictions,
        });
    }

    if out.is_empty() {
        emit(sink, StageEvent::failed(Stage::Forecast, "no groups to forecast"));
        return Err(TrendError::EmptyInput);
    }

    emit(
        sink,
        StageEvent::ok(Stage::Forecast, "forecast complete")
            .count("groups", out.len())
            .count("skipped", skipped)
            .count("offsets", offsets.len()),
    );
    Ok(out)
}

fn future_date(last_day: NaiveDate, offset_days: u32) -> Result<NaiveDate, TrendError> {
    last_day
        .checked_add_signed(Duration::days(i64::from(offset_days)))
        .ok_or_else(|| TrendError::Prediction(format!("{last_day} + {offset_days} days is out of range")))
}

fn predict_at(model: &dyn Regressor, group: &str, period: NaiveDate) -> Result<f64, TrendError> {
    let rows = features(&[SeriesKey {
        period,
        group: group.to_string(),
    }]);
    let prediction = model.predict(&feature_matrix(&rows))?;
    match prediction.as_slice() {
        [v] if v.is_finite() => Ok(*v),
        [v] => Err(TrendError::Prediction(format!("non-finite prediction {v} for '{group}' at {period}"))),
        other => Err(TrendError::Prediction(format!(
            "expected 1 prediction for '{group}' at {period}, got {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::normalize::{RawTable, normalize_table};
    use crate::observe::RecordingSink;
    use nalgebra::DMatrix;
    use serde_json::{Value, json};

    /// Predicts the day of month, so the prediction reveals the date used.
    struct DayOfMonth;

    impl Regressor for DayOfMonth {
        fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError> {
            Ok(features.column(3).iter().copied().collect())
        }
    }

    struct Broken;

    impl Regressor for Broken {
        fn predict(&self, _features: &DMatrix<f64>) -> Result<Vec<f64>, TrendError> {
            Ok(vec![f64::NAN, 1.0])
        }
    }

    fn table(rows: Vec<(Value, &str, f64)>) -> CanonicalTable {
        let mut raw = RawTable::new(vec!["period".into(), "ratio".into(), "group".into()]);
        for (period, group, ratio) in rows {
            raw.push_row(vec![period, json!(ratio), json!(group)]);
        }
        normalize_table(raw, None).unwrap()
    }

    #[test]
    fn one_row_per_group_anchored_on_its_own_last_day() {
        let t = table(vec![
            (json!("2025-01-10"), "coffee", 10.0),
            (json!("2025-01-12"), "coffee", 20.0),
            (json!("2025-01-11"), "coffee", 30.0),
            (json!("2025-01-20"), "tea", 5.0),
        ]);

        let rows = forecast(&t, &DayOfMonth, &DEFAULT_OFFSETS, None).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].group, "coffee");
        assert_eq!(rows[0].last_day, NaiveDate::from_ymd_opt(2025, 1, 12).unwrap());
        assert_eq!(rows[0].pred_3d(), Some(15.0));
        assert_eq!(rows[0].pred_7d(), Some(19.0));

        assert_eq!(rows[1].group, "tea");
        assert_eq!(rows[1].pred_3d(), Some(23.0));
        assert_eq!(rows[1].pred_7d(), Some(27.0));
    }

    #[test]
    fn forecasting_is_deterministic() {
        let t = table(vec![(json!("2025-02-27"), "a", 1.0), (json!("2025-03-01"), "b", 1.0)]);
        let first = forecast(&t, &DayOfMonth, &[3, 7], None).unwrap();
        let second = forecast(&t, &DayOfMonth, &[3, 7], None).unwrap();
        assert_eq!(first, second);
        // 2025-02-27 + 3 days crosses into March.
        assert_eq!(first[0].pred_3d(), Some(2.0));
    }

    #[test]
    fn groups_without_dates_are_skipped() {
        let sink = RecordingSink::new();
        let t = table(vec![(json!("2025-01-01"), "a", 1.0), (json!("??"), "b", 1.0)]);

        let rows = forecast(&t, &DayOfMonth, &[3], Some(&sink)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].predictions, vec![(3, 4.0)]);
        assert_eq!(sink.by_stage(Stage::Forecast).last().unwrap().get("skipped"), Some(1));
    }

    #[test]
    fn empty_table_is_an_error() {
        let empty = normalize_table(RawTable::new(vec!["period".into(), "ratio".into(), "group".into()]), None)
            .unwrap();
        assert!(matches!(forecast(&empty, &DayOfMonth, &[3, 7], None), Err(TrendError::EmptyInput)));
    }

    #[test]
    fn malformed_model_output_is_reported() {
        let t = table(vec![(json!("2025-01-01"), "a", 1.0)]);
        assert!(matches!(forecast(&t, &Broken, &[3], None), Err(TrendError::Prediction(_))));
    }

    #[test]
    fn offsets_are_sorted_deduplicated_and_positive() {
        assert_eq!(normalize_offsets(&[7, 3, 7]).unwrap(), vec![3, 7]);
        assert!(normalize_offsets(&[]).is_err());
        assert!(normalize_offsets(&[0, 3]).is_err());
    }

    #[test]
    fn bad_offsets_are_a_configuration_error() {
        let t = table(vec![(json!("2025-01-01"), "a", 1.0)]);
        let cases: [&[u32]; 2] = [&[], &[0, 3]];
        for offsets in cases {
            let err = forecast(&t, &DayOfMonth, offsets, None).unwrap_err();
            assert!(matches!(err, TrendError::InvalidOffsets(_)));
            assert_eq!(err.exit_code(), 2);
        }
    }
}
