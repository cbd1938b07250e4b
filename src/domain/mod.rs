//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - request planning types (`KeywordGroup`, `Batch`, `DateRange`)
//! - raw provider payloads (`RawSeriesFragment`)
//! - the canonical time series (`CanonicalTable`) and forecasts (`ForecastRow`)
//! - run configuration (`CollectConfig`, `ForecastConfig`)

pub mod types;

pub use types::*;
