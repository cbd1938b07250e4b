//! Error types.
//!
//! Two layers:
//!
//! - `AppError` is what the binary sees: a message plus a process exit code.
//! - `TrendError` (and friends) is the structured taxonomy used by the library
//!   stages, so callers can tell a failed batch from a broken schema.
//!
//! Exit codes:
//! - 2: bad input / configuration / credentials
//! - 3: collected data could not be normalized (or nothing was collected)
//! - 4: network, model, or file I/O failure

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// A single batch request that did not produce data.
///
/// `status` is absent when the request never got an HTTP response
/// (connect/timeout errors).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trend request failed ({}): {body}", fmt_status(.status))]
pub struct FetchError {
    pub status: Option<u16>,
    pub body: String,
}

impl FetchError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: message.into(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no response".to_string(),
    }
}

/// The concatenated provider output cannot be reconciled into
/// `period,group,ratio`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("no 'period' or 'date' column found; available columns: {columns:?}")]
    MissingDateColumn { columns: Vec<String> },
    #[error("no 'ratio' column and no numeric column to use instead; available columns: {columns:?}")]
    MissingRatioColumn { columns: Vec<String> },
    #[error("no 'group' column and no '*title*' column; available columns: {columns:?}")]
    MissingGroupColumn { columns: Vec<String> },
    #[error("none of the {rows} rows has a parseable date in column '{column}'")]
    UnparsableDates { column: String, rows: usize },
    #[error("none of the {rows} rows has a numeric value in column '{column}'")]
    UnresolvableRatios { column: String, rows: usize },
}

/// Structured failures of the collection and forecast stages.
#[derive(Debug, Clone, Error)]
pub enum TrendError {
    #[error("missing credentials: {0}")]
    Auth(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no trend data collected ({failed} of {batches} batches failed)")]
    NoData { batches: usize, failed: usize },
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error("nothing to forecast: the trend table has no dated groups")]
    EmptyInput,
    #[error("invalid forecast offsets: {0}")]
    InvalidOffsets(String),
    #[error("failed to load model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("model prediction failed: {0}")]
    Prediction(String),
}

impl TrendError {
    pub fn exit_code(&self) -> u8 {
        match self {
            TrendError::Auth(_) => 2,
            TrendError::EmptyInput | TrendError::InvalidOffsets(_) => 2,
            TrendError::NoData { .. } | TrendError::Normalization(_) => 3,
            TrendError::Fetch(_) | TrendError::ModelLoad { .. } | TrendError::Prediction(_) => 4,
        }
    }
}

impl From<TrendError> for AppError {
    fn from(err: TrendError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_message_includes_status_and_body() {
        let err = FetchError::http(429, "rate limited");
        assert_eq!(err.to_string(), "trend request failed (status 429): rate limited");

        let err = FetchError::transport("connection refused");
        assert_eq!(err.to_string(), "trend request failed (no response): connection refused");
    }

    #[test]
    fn trend_errors_map_to_exit_codes() {
        let auth: AppError = TrendError::Auth("NAVER_CLIENT_ID".to_string()).into();
        assert_eq!(auth.exit_code(), 2);

        let schema: AppError = TrendError::from(NormalizationError::MissingDateColumn {
            columns: vec!["x".to_string()],
        })
        .into();
        assert_eq!(schema.exit_code(), 3);
        assert!(schema.to_string().contains("'period' or 'date'"));

        let model: AppError = TrendError::ModelLoad {
            path: "m.json".to_string(),
            reason: "not found".to_string(),
        }
        .into();
        assert_eq!(model.exit_code(), 4);

        let offsets: AppError = TrendError::InvalidOffsets("at least one forecast offset is required".to_string()).into();
        assert_eq!(offsets.exit_code(), 2);
        assert!(offsets.to_string().starts_with("invalid forecast offsets"));
    }
}
