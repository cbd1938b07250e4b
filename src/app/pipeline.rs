//! Shared collection/forecast pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! credentials -> batching -> fetch (per batch) -> normalize -> forecast
//!
//! The CLI handlers then only deal with presentation and exports.

use std::path::Path;

use crate::batch::chunk;
use crate::data::{Credentials, NaverClient, SyntheticSource, TrendSource};
use crate::domain::{CanonicalTable, CollectConfig, DateRange, ForecastConfig, ForecastRow, RawSeriesFragment, SourceKind};
use crate::error::{AppError, FetchError, TrendError};
use crate::forecast::forecast;
use crate::io::normalize::normalize;
use crate::io::raw::{RawCapture, read_capture_json};
use crate::models::load_model;
use crate::observe::{EventSink, Stage, StageEvent, emit};

/// A batch whose request failed; its groups are missing from the table.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// 1-based batch number.
    pub index: usize,
    pub groups: Vec<String>,
    pub error: FetchError,
}

/// Everything a collection run produced.
#[derive(Debug, Clone)]
pub struct Collection {
    pub source: String,
    pub range: DateRange,
    pub batches: usize,
    /// Fragments of the successful batches, in batch order.
    pub fragments: Vec<Vec<RawSeriesFragment>>,
    pub failures: Vec<BatchFailure>,
    pub table: CanonicalTable,
}

impl Collection {
    pub fn capture(&self) -> RawCapture {
        RawCapture::new(self.range, self.fragments.clone())
    }
}

/// Fetch every batch sequentially from `source` and normalize the result.
///
/// A failed batch is recorded and skipped; it is not retried. The run only
/// fails when no batch produced any rows or the combined output cannot be
/// normalized.
pub fn collect_from(
    source: &dyn TrendSource,
    keywords: &[String],
    range: DateRange,
    chunk_size: usize,
    group_size: usize,
    sink: Option<&dyn EventSink>,
) -> Result<Collection, TrendError> {
    let batches = chunk(keywords, chunk_size, group_size);
    let group_count: usize = batches.iter().map(|b| b.groups.len()).sum();
    emit(
        sink,
        StageEvent::ok(Stage::Batching, format!("{} .. {}, source {}", range.start, range.end, source.describe()))
            .count("keywords", keywords.len())
            .count("groups", group_count)
            .count("batches", batches.len()),
    );

    let mut fragments = Vec::with_capacity(batches.len());
    let mut failures = Vec::new();
    for (i, batch) in batches.iter().enumerate() {
        let index = i + 1;
        match source.fetch(batch, range) {
            Ok(result) => {
                let rows: usize = result.iter().map(|f| f.data.len()).sum();
                emit(
                    sink,
                    StageEvent::ok(Stage::Fetch, format!("batch {index}/{} {:?}", batches.len(), batch.group_names()))
                        .count("series", result.len())
                        .count("rows", rows),
                );
                fragments.push(result);
            }
            Err(error) => {
                emit(
                    sink,
                    StageEvent::warn(Stage::Fetch, format!("batch {index}/{} failed: {error}", batches.len()))
                        .count("groups", batch.groups.len()),
                );
                failures.push(BatchFailure {
                    index,
                    groups: batch.group_names().into_iter().map(str::to_string).collect(),
                    error,
                });
            }
        }
    }

    let rows: usize = fragments.iter().flatten().map(|f| f.data.len()).sum();
    if rows == 0 {
        emit(sink, StageEvent::failed(Stage::Fetch, "no trend data collected"));
        return Err(TrendError::NoData {
            batches: batches.len(),
            failed: failures.len(),
        });
    }

    let table = normalize(&fragments, sink)?;

    Ok(Collection {
        source: source.describe(),
        range,
        batches: batches.len(),
        fragments,
        failures,
        table,
    })
}

/// Normalize a previously saved capture.
pub fn collect_from_capture(path: &Path, sink: Option<&dyn EventSink>) -> Result<Collection, AppError> {
    let capture = read_capture_json(path)?;
    let rows: usize = capture.batches.iter().flatten().map(|f| f.data.len()).sum();
    if rows == 0 {
        return Err(TrendError::NoData {
            batches: capture.batches.len(),
            failed: 0,
        }
        .into());
    }
    let table = normalize(&capture.batches, sink).map_err(TrendError::from)?;
    Ok(Collection {
        source: format!("capture ({})", path.display()),
        range: capture.range,
        batches: capture.batches.len(),
        fragments: capture.batches,
        failures: Vec::new(),
        table,
    })
}

/// Run a collection as configured: pick the source, fetch, normalize.
pub fn collect(config: &CollectConfig, sink: Option<&dyn EventSink>) -> Result<Collection, AppError> {
    match &config.source {
        SourceKind::Capture { path } => collect_from_capture(path, sink),
        SourceKind::Synthetic { seed } => {
            let source = SyntheticSource::new(*seed);
            run_collection(&source, config, sink)
        }
        SourceKind::Naver { endpoint } => {
            let credentials = Credentials::from_env().inspect_err(|e| {
                emit(sink, StageEvent::failed(Stage::Credentials, e.to_string()));
            })?;
            emit(sink, StageEvent::ok(Stage::Credentials, "credentials loaded"));
            let client = NaverClient::new(credentials, endpoint.clone())?;
            run_collection(&client, config, sink)
        }
    }
}

fn run_collection(
    source: &dyn TrendSource,
    config: &CollectConfig,
    sink: Option<&dyn EventSink>,
) -> Result<Collection, AppError> {
    Ok(collect_from(
        source,
        &config.keywords,
        config.range,
        config.chunk_size,
        config.group_size,
        sink,
    )?)
}

/// Load the model and forecast every group of `table`.
pub fn run_forecast(
    table: &CanonicalTable,
    config: &ForecastConfig,
    sink: Option<&dyn EventSink>,
) -> Result<Vec<ForecastRow>, AppError> {
    let model = load_model(&config.model_path).inspect_err(|e| {
        emit(sink, StageEvent::failed(Stage::Forecast, e.to_string()));
    })?;
    emit(
        sink,
        StageEvent::ok(Stage::Forecast, format!("loaded {} model from {}", model.kind(), config.model_path.display())),
    );
    Ok(forecast(table, &model, &config.offsets, sink)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Batch;
    use crate::observe::{RecordingSink, Status};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::cell::RefCell;

    /// Returns one `period`/`ratio` point per group; fails the listed batches.
    struct ScriptedSource {
        fail_batches: Vec<usize>,
        calls: RefCell<usize>,
    }

    impl ScriptedSource {
        fn new(fail_batches: Vec<usize>) -> Self {
            Self {
                fail_batches,
                calls: RefCell::new(0),
            }
        }
    }

    impl TrendSource for ScriptedSource {
        fn fetch(&self, batch: &Batch, range: DateRange) -> Result<Vec<RawSeriesFragment>, FetchError> {
            *self.calls.borrow_mut() += 1;
            let call = *self.calls.borrow();
            if self.fail_batches.contains(&call) {
                return Err(FetchError::http(500, "upstream error"));
            }
            Ok(batch
                .groups
                .iter()
                .map(|g| {
                    serde_json::from_value(json!({
                        "title": g.name(),
                        "data": [{ "period": range.end.to_string(), "ratio": 50.0 }]
                    }))
                    .unwrap()
                })
                .collect())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn range() -> DateRange {
        DateRange::lookback(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 7).unwrap()
    }

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{i:03}")).collect()
    }

    #[test]
    fn alphabet_takes_a_single_call() {
        let source = ScriptedSource::new(vec![]);
        let alphabet: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();

        let run = collect_from(&source, &alphabet, range(), 5, 20, None).unwrap();
        assert_eq!(*source.calls.borrow(), 1);
        assert_eq!(run.batches, 1);
        assert_eq!(run.table.groups(), ["a", "u"]);
    }

    #[test]
    fn failed_batch_degrades_instead_of_aborting() {
        // 11 groups of 20 -> 3 batches (5 + 5 + 1); the third one fails.
        let sink = RecordingSink::new();
        let source = ScriptedSource::new(vec![3]);

        let run = collect_from(&source, &keywords(220), range(), 5, 20, Some(&sink)).unwrap();
        assert_eq!(run.batches, 3);
        assert_eq!(run.fragments.len(), 2);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].index, 3);
        assert_eq!(run.failures[0].groups, ["kw200"]);
        assert_eq!(run.failures[0].error.status, Some(500));
        assert_eq!(run.table.groups().len(), 10);

        let fetch_events = sink.by_stage(Stage::Fetch);
        assert_eq!(fetch_events.iter().filter(|e| e.status == Status::Warn).count(), 1);
        assert_eq!(fetch_events.iter().filter(|e| e.status == Status::Ok).count(), 2);
    }

    #[test]
    fn all_batches_failing_is_no_data() {
        let source = ScriptedSource::new(vec![1, 2]);
        let err = collect_from(&source, &keywords(120), range(), 5, 20, None).unwrap_err();
        assert!(matches!(err, TrendError::NoData { batches: 2, failed: 2 }));
    }

    #[test]
    fn empty_keywords_make_no_calls() {
        let source = ScriptedSource::new(vec![]);
        let err = collect_from(&source, &[], range(), 5, 20, None).unwrap_err();
        assert_eq!(*source.calls.borrow(), 0);
        assert!(matches!(err, TrendError::NoData { batches: 0, failed: 0 }));
    }

    #[test]
    fn synthetic_collection_round_trips_through_a_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");

        let source = SyntheticSource::new(3);
        let run = collect_from(&source, &keywords(30), range(), 5, 20, None).unwrap();
        crate::io::raw::write_capture_json(&path, &run.capture()).unwrap();

        let replay = collect_from_capture(&path, None).unwrap();
        assert_eq!(replay.range, run.range);
        assert_eq!(replay.table.len(), run.table.len());
        for (a, b) in replay.table.rows().iter().zip(run.table.rows()) {
            assert_eq!((a.period, &a.group), (b.period, &b.group));
            assert!((a.ratio.unwrap() - b.ratio.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn missing_model_aborts_the_forecast() {
        let source = SyntheticSource::new(3);
        let run = collect_from(&source, &keywords(5), range(), 5, 20, None).unwrap();
        let config = ForecastConfig {
            model_path: "/no/such/model.json".into(),
            offsets: vec![3, 7],
            export_forecast: None,
        };
        let err = run_forecast(&run.table, &config, None).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("failed to load model"));
    }
}
