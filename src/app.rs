//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module:
//! - parses CLI arguments and sets up logging
//! - resolves flags into `CollectConfig` / `ForecastConfig`
//! - runs the pipeline
//! - prints reports and writes optional exports

use chrono::{Local, NaiveDate};
use clap::Parser;

use crate::app::pipeline::Collection;
use crate::batch::{chunk, validate_sizes};
use crate::cli::{Cli, CollectArgs, Command, ForecastArgs, PlanArgs};
use crate::data::keywords::{dedup_keywords, load_keywords};
use crate::domain::{CollectConfig, DateRange, ForecastConfig, ForecastRow, SourceKind};
use crate::error::AppError;
use crate::forecast::normalize_offsets;
use crate::observe::{EventSink, Stage, StageEvent, TracingSink, emit};

pub mod pipeline;

/// Entry point for the `kwt` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    if let Some(path) = crate::logging::init_logging(cli.verbose, cli.log_dir.as_deref())? {
        tracing::info!(path = %path.display(), "writing log file");
    }

    match cli.command {
        Command::Plan(args) => handle_plan(args),
        Command::Collect(args) => handle_collect(args),
        Command::Forecast(args) => handle_forecast(args),
    }
}

fn handle_plan(args: PlanArgs) -> Result<(), AppError> {
    let kw = &args.keywords;
    validate_sizes(kw.chunk_size, kw.group_size)?;
    let keywords = load_keywords(&kw.keywords, kw.keywords_file.as_deref())?;
    let batches = chunk(&keywords, kw.chunk_size, kw.group_size);
    println!("{}", crate::report::format_plan(&batches));
    Ok(())
}

fn handle_collect(args: CollectArgs) -> Result<(), AppError> {
    let config = collect_config_from_args(&args, today())?;
    let sink = TracingSink;
    let collection = pipeline::collect(&config, Some(&sink))?;

    print_collection(&collection, &config);
    write_collection_exports(&collection, &config, &sink)
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let config = collect_config_from_args(&args.collect, today())?;
    let forecast_config = forecast_config_from_args(&args)?;
    let sink = TracingSink;
    let collection = pipeline::collect(&config, Some(&sink))?;

    print_collection(&collection, &config);
    write_collection_exports(&collection, &config, &sink)?;

    let rows = pipeline::run_forecast(&collection.table, &forecast_config, Some(&sink))?;
    println!(
        "{}",
        crate::report::format_forecast(&rows, &forecast_config.offsets, config.top_n)
    );
    write_forecast_export(&rows, &forecast_config, &sink)
}

fn print_collection(collection: &Collection, config: &CollectConfig) {
    println!("{}", crate::report::format_collection_summary(collection));
    println!("{}", crate::report::format_series_overview(&collection.table));
    println!(
        "{}",
        crate::report::format_latest_ranking(&collection.table, config.top_n)
    );
}

fn write_collection_exports(
    collection: &Collection,
    config: &CollectConfig,
    sink: &dyn EventSink,
) -> Result<(), AppError> {
    if let Some(path) = &config.save_raw {
        crate::io::raw::write_capture_json(path, &collection.capture())?;
        emit(Some(sink), StageEvent::ok(Stage::Export, format!("raw capture -> {}", path.display())));
    }
    if let Some(path) = &config.export_table {
        crate::io::export::write_table_csv(path, &collection.table)?;
        emit(
            Some(sink),
            StageEvent::ok(Stage::Export, format!("table -> {}", path.display())).count("rows", collection.table.len()),
        );
    }
    if let Some(path) = &config.export_features {
        crate::io::export::write_features_csv(path, &collection.table)?;
        emit(Some(sink), StageEvent::ok(Stage::Export, format!("features -> {}", path.display())));
    }
    Ok(())
}

fn write_forecast_export(rows: &[ForecastRow], config: &ForecastConfig, sink: &dyn EventSink) -> Result<(), AppError> {
    if let Some(path) = &config.export_forecast {
        crate::io::export::write_forecast_csv(path, rows, &config.offsets)?;
        emit(
            Some(sink),
            StageEvent::ok(Stage::Export, format!("forecast -> {}", path.display())).count("groups", rows.len()),
        );
    }
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolve collection flags. `today` anchors the default lookback window.
pub fn collect_config_from_args(args: &CollectArgs, today: NaiveDate) -> Result<CollectConfig, AppError> {
    let kw = &args.keywords;
    validate_sizes(kw.chunk_size, kw.group_size)?;

    // A saved capture already holds its groups; keywords are optional then.
    let keywords = if args.from_raw.is_some() {
        dedup_keywords(&kw.keywords)
    } else {
        load_keywords(&kw.keywords, kw.keywords_file.as_deref())?
    };

    let source = match (&args.from_raw, args.synthetic) {
        (Some(path), _) => SourceKind::Capture { path: path.clone() },
        (None, true) => SourceKind::Synthetic { seed: args.seed },
        (None, false) => SourceKind::Naver {
            endpoint: args.endpoint.clone(),
        },
    };

    Ok(CollectConfig {
        keywords,
        range: resolve_range(args.start, args.end, args.days, today)?,
        chunk_size: kw.chunk_size,
        group_size: kw.group_size,
        source,
        top_n: args.top,
        export_table: args.export_table.clone(),
        export_features: args.export_features.clone(),
        save_raw: args.save_raw.clone(),
    })
}

pub fn forecast_config_from_args(args: &ForecastArgs) -> Result<ForecastConfig, AppError> {
    let offsets = normalize_offsets(&args.offsets).map_err(|e| AppError::new(2, format!("Invalid --offsets: {e}.")))?;
    Ok(ForecastConfig {
        model_path: args.model.clone(),
        offsets,
        export_forecast: args.export_forecast.clone(),
    })
}

fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: u32,
    today: NaiveDate,
) -> Result<DateRange, AppError> {
    let end = end.unwrap_or(today);
    let Some(start) = start else {
        return DateRange::lookback(end, days)
            .ok_or_else(|| AppError::new(2, format!("--days {days} is out of range for end date {end}.")));
    };
    DateRange::new(start, end)
        .ok_or_else(|| AppError::new(2, format!("--start {start} is after --end {end}.")))
}
