//! Formatted terminal output.
//!
//! Everything here returns a `String`; printing is left to `app`.

use crate::app::pipeline::Collection;
use crate::domain::{Batch, CanonicalTable, ForecastRow};
use crate::report::{rank_forecasts, rank_latest, summarize_groups};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 30;
const GROUP_WIDTH: usize = 20;

/// Batch plan: one line per batch with its groups and member counts.
pub fn format_plan(batches: &[Batch]) -> String {
    let mut out = String::new();
    let groups: usize = batches.iter().map(|b| b.groups.len()).sum();
    let keywords: usize = batches.iter().map(Batch::keyword_count).sum();
    out.push_str(&format!(
        "Plan: {keywords} keywords -> {groups} groups -> {} requests\n",
        batches.len()
    ));
    for (i, batch) in batches.iter().enumerate() {
        let parts: Vec<String> = batch
            .groups
            .iter()
            .map(|g| format!("{} ({})", g.name(), g.members().len()))
            .collect();
        out.push_str(&format!("  batch {:>3}: {}\n", i + 1, parts.join(", ")));
    }
    out
}

/// Collection summary: source, range, batch outcomes and column resolution.
pub fn format_collection_summary(collection: &Collection) -> String {
    let table = &collection.table;
    let report = table.report();
    let mut out = String::new();

    out.push_str("=== kwt - keyword trend collection ===\n");
    out.push_str(&format!("Source: {}\n", collection.source));
    out.push_str(&format!(
        "Range: {} .. {} ({} days)\n",
        collection.range.start,
        collection.range.end,
        collection.range.days().count()
    ));
    out.push_str(&format!(
        "Batches: {} ok, {} failed\n",
        collection.batches - collection.failures.len(),
        collection.failures.len()
    ));
    for failure in &collection.failures {
        out.push_str(&format!(
            "  ! batch {} [{}]: {}\n",
            failure.index,
            failure.groups.join(", "),
            failure.error
        ));
    }

    out.push_str(&format!(
        "Rows: {} kept of {} | groups={} | null periods={} | null ratios={}",
        table.len(),
        report.rows_in,
        table.groups().len(),
        report.null_periods,
        report.null_ratios,
    ));
    if report.dropped_empty_group > 0 {
        out.push_str(&format!(" | dropped (no group)={}", report.dropped_empty_group));
    }
    out.push('\n');

    out.push_str(&format!(
        "Columns: period <- '{}', ratio <- '{}', group <- '{}'\n",
        report.date_source, report.ratio_source, report.group_source
    ));
    if report.raw_columns != report.cleaned_columns {
        out.push_str(&format!("  cleaned: {:?} -> {:?}\n", report.raw_columns, report.cleaned_columns));
    }
    out
}

/// Per-group sparkline with min / max / latest.
pub fn format_series_overview(table: &CanonicalTable) -> String {
    let mut out = String::new();
    out.push_str("Series overview:\n");
    out.push_str(
        format!(
            "{:<gw$} {:<sw$} {:>8} {:>8} {:>8}\n",
            "group",
            "trend",
            "min",
            "max",
            "latest",
            gw = GROUP_WIDTH,
            sw = SPARK_WIDTH
        )
        .trim_end(),
    );
    out.push('\n');

    for summary in summarize_groups(table) {
        let values: Vec<f64> = summary.series.iter().map(|(_, v)| *v).collect();
        out.push_str(
            format!(
                "{:<gw$} {:<sw$} {:>8} {:>8} {:>8}\n",
                truncate(&summary.group, GROUP_WIDTH),
                sparkline(&values, SPARK_WIDTH),
                fmt_opt(summary.min()),
                fmt_opt(summary.max()),
                fmt_opt(summary.latest().map(|(_, v)| v)),
                gw = GROUP_WIDTH,
                sw = SPARK_WIDTH
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Groups ranked by ratio on the latest date.
pub fn format_latest_ranking(table: &CanonicalTable, top_n: usize) -> String {
    let Some((date, ranked)) = rank_latest(table, top_n) else {
        return "No dated rows to rank.\n".to_string();
    };
    let mut out = String::new();
    out.push_str(&format!("Top {} on {date}:\n", ranked.len()));
    for (i, (group, ratio)) in ranked.iter().enumerate() {
        out.push_str(&format!("{:>4}. {:<gw$} {ratio:>9.3}\n", i + 1, truncate(group, GROUP_WIDTH), gw = GROUP_WIDTH));
    }
    out
}

/// Forecast table, sorted by the first offset's prediction.
pub fn format_forecast(rows: &[ForecastRow], offsets: &[u32], top_n: usize) -> String {
    let mut out = String::new();
    let Some(&first) = offsets.first() else {
        return out;
    };
    let ranked = rank_forecasts(rows, first, top_n);

    out.push_str(&format!("Forecast (sorted by +{first}d, top {}):\n", ranked.len()));
    let mut header = format!("{:<gw$} {:<10}", "group", "last_day", gw = GROUP_WIDTH);
    for d in offsets {
        header.push_str(&format!(" {:>10}", format!("pred_{d}d")));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for row in &ranked {
        let mut line = format!(
            "{:<gw$} {:<10}",
            truncate(&row.group, GROUP_WIDTH),
            row.last_day.format("%Y-%m-%d"),
            gw = GROUP_WIDTH
        );
        for &d in offsets {
            line.push_str(&format!(" {:>10}", fmt_opt(row.prediction(d))));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Scale `values` onto eight block levels, keeping the last `width` points.
pub fn sparkline(values: &[f64], width: usize) -> String {
    let values = &values[values.len().saturating_sub(width)..];
    let Some(lo) = values.iter().copied().reduce(f64::min) else {
        return String::new();
    };
    let hi = values.iter().copied().fold(lo, f64::max);
    let span = hi - lo;
    values
        .iter()
        .map(|v| {
            if span <= 0.0 {
                return SPARK_LEVELS[SPARK_LEVELS.len() / 2];
            }
            let level = ((v - lo) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
