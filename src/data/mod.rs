//! Trend data sources.
//!
//! - `naver`: the live search-trend API
//! - `sample`: deterministic synthetic data for offline runs
//! - `credentials`: API credentials from the environment
//! - `keywords`: keyword list loading

use crate::domain::{Batch, DateRange, RawSeriesFragment};
use crate::error::FetchError;

pub mod credentials;
pub mod keywords;
pub mod naver;
pub mod sample;

pub use credentials::Credentials;
pub use naver::NaverClient;
pub use sample::SyntheticSource;

/// Something that can answer one batch request with raw series fragments.
pub trait TrendSource {
    fn fetch(&self, batch: &Batch, range: DateRange) -> Result<Vec<RawSeriesFragment>, FetchError>;

    /// Short label for logs and reports.
    fn describe(&self) -> String;
}
