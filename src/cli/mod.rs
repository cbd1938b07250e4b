//! Command-line parsing for the keyword trend pipeline.
//!
//! Parsing and dispatch live here and in `app`, away from the batching,
//! normalization and forecasting code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::batch::{DEFAULT_CHUNK_SIZE, DEFAULT_GROUP_SIZE};
use crate::forecast::DEFAULT_OFFSETS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "kwt", version, about = "Keyword search-trend collector and forecaster")]
pub struct Cli {
    /// Log debug detail (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write a timestamped log file into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print how the keywords would be grouped and batched (no network).
    Plan(PlanArgs),
    /// Fetch trend data, normalize it and print a summary.
    Collect(CollectArgs),
    /// Collect (or load a saved capture), then forecast each group.
    Forecast(ForecastArgs),
}

/// Keyword input and grouping options.
#[derive(Debug, Args, Clone)]
pub struct KeywordArgs {
    /// Keyword to track (repeatable).
    #[arg(short = 'k', long = "keyword", value_name = "WORD")]
    pub keywords: Vec<String>,

    /// File with one keyword per line (`#` starts a comment).
    #[arg(short = 'f', long, value_name = "FILE")]
    pub keywords_file: Option<PathBuf>,

    /// Keyword groups per request (1-5).
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Keywords per group (1-20).
    #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
    pub group_size: usize,
}

#[derive(Debug, Args, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub keywords: KeywordArgs,
}

/// Options shared by `collect` and `forecast`.
#[derive(Debug, Args, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub keywords: KeywordArgs,

    /// Lookback window in days, ending today.
    #[arg(long, default_value_t = 7)]
    pub days: u32,

    /// First day of the window (YYYY-MM-DD); overrides --days.
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD); defaults to today.
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,

    /// Override the search-trend endpoint URL.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Use deterministic synthetic data instead of the API.
    #[arg(long)]
    pub synthetic: bool,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Normalize a capture saved with --save-raw instead of fetching.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["synthetic", "endpoint"])]
    pub from_raw: Option<PathBuf>,

    /// Show the top-N groups in rankings.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the canonical `period,group,ratio` table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_table: Option<PathBuf>,

    /// Export calendar features of the collected rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_features: Option<PathBuf>,

    /// Save the raw provider fragments to JSON for later --from-raw runs.
    #[arg(long, value_name = "JSON")]
    pub save_raw: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub collect: CollectArgs,

    /// Model artifact (JSON).
    #[arg(long, default_value = "trained_model.json", value_name = "JSON")]
    pub model: PathBuf,

    /// Forecast offsets in days after each group's last observation.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_OFFSETS)]
    pub offsets: Vec<u32>,

    /// Export forecasts to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_forecast: Option<PathBuf>,
}
