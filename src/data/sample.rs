//! Synthetic trend data for offline runs.
//!
//! Each group gets a deterministic daily series (a group-specific level, a
//! weekend bump, and log-normal noise) seeded from the run seed and the
//! group's keywords, so the same keywords always produce the same data. Like the
//! provider, values are rescaled per request so the largest ratio in the
//! batch is 100.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde_json::{Map, Value, json};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::data::TrendSource;
use crate::domain::{Batch, DateRange, KeywordGroup, RawSeriesFragment};
use crate::error::FetchError;

/// Daily log-volatility of the synthetic series.
const NOISE_SIGMA: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn group_series(&self, group: &KeywordGroup, range: DateRange) -> Result<Vec<(NaiveDate, f64)>, FetchError> {
        let mut rng = StdRng::seed_from_u64(group_seed(self.seed, group));
        let normal = Normal::new(0.0, NOISE_SIGMA)
            .map_err(|e| FetchError::transport(format!("synthetic noise distribution error: {e}")))?;

        // Larger groups draw more search interest.
        let level = rng.gen_range(5.0..40.0) * (group.members().len() as f64).sqrt();
        let weekend_lift = rng.gen_range(-0.3..0.5);

        Ok(range
            .days()
            .map(|day| {
                let seasonal = match day.weekday() {
                    Weekday::Sat | Weekday::Sun => 1.0 + weekend_lift,
                    _ => 1.0,
                };
                let noise: f64 = normal.sample(&mut rng);
                (day, level * seasonal * noise.exp())
            })
            .collect())
    }
}

impl TrendSource for SyntheticSource {
    fn fetch(&self, batch: &Batch, range: DateRange) -> Result<Vec<RawSeriesFragment>, FetchError> {
        let series = batch
            .groups
            .iter()
            .map(|g| self.group_series(g, range))
            .collect::<Result<Vec<_>, _>>()?;

        let max = series
            .iter()
            .flatten()
            .map(|(_, v)| *v)
            .fold(0.0_f64, f64::max);
        let scale = if max > 0.0 { 100.0 / max } else { 0.0 };

        Ok(batch
            .groups
            .iter()
            .zip(series)
            .map(|(group, points)| RawSeriesFragment {
                title: group.name().to_string(),
                keywords: group.members().to_vec(),
                data: points
                    .into_iter()
                    .map(|(day, v)| data_point(day, round5(v * scale)))
                    .collect(),
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("synthetic (seed {})", self.seed)
    }
}

fn data_point(day: NaiveDate, ratio: f64) -> Map<String, Value> {
    let mut point = Map::new();
    point.insert("period".to_string(), json!(day.format("%Y-%m-%d").to_string()));
    point.insert("ratio".to_string(), json!(ratio));
    point
}

fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

/// Stable across builds: xxh3 over the NUL-separated member bytes.
fn group_seed(seed: u64, group: &KeywordGroup) -> u64 {
    let mut bytes = Vec::new();
    for member in group.members() {
        bytes.extend_from_slice(member.as_bytes());
        bytes.push(0);
    }
    xxh3_64_with_seed(&bytes, seed)
}
