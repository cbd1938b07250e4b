//! `tracing` subscriber setup for the binary.
//!
//! Logs go to stderr so report output on stdout stays clean. With a log
//! directory, the same events are also appended to a timestamped file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::AppError;

/// Install the global subscriber. Returns the log file path, if any.
///
/// `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>, AppError> {
    let default = if verbose { "kw_trends=debug" } else { "kw_trends=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::new(4, format!("Failed to create log directory '{}': {e}", dir.display())))?;
            let path = dir.join(log_file_name(Local::now().naive_local()));
            let file = File::create(&path)
                .map_err(|e| AppError::new(4, format!("Failed to create log file '{}': {e}", path.display())))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::new(4, format!("Failed to initialize logging: {e}")))?;

    Ok(path)
}

/// `log_YYYYMMDD_HHMMSS.txt`
pub fn log_file_name(at: NaiveDateTime) -> String {
    at.format("log_%Y%m%d_%H%M%S.txt").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn log_file_name_is_timestamped() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap();
        assert_eq!(log_file_name(at), "log_20250309_070530.txt");
    }
}
