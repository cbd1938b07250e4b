//! Structured stage events.
//!
//! Pipeline stages do not log through a global logger. They accept an
//! optional [`EventSink`] and report what happened as a [`StageEvent`]
//! (stage, status, message, counters). The binary plugs in [`TracingSink`];
//! tests use [`RecordingSink`] to assert on the event stream.

use std::cell::RefCell;
use std::fmt;

/// Pipeline stage that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Credentials,
    Batching,
    Fetch,
    Normalize,
    Forecast,
    Export,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Credentials => "credentials",
            Stage::Batching => "batching",
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Forecast => "forecast",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Degraded but continuing (e.g. one batch failed).
    Warn,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageEvent {
    pub stage: Stage,
    pub status: Status,
    pub message: String,
    pub counts: Vec<(&'static str, usize)>,
}

impl StageEvent {
    pub fn new(stage: Stage, status: Status, message: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            message: message.into(),
            counts: Vec::new(),
        }
    }

    pub fn ok(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Status::Ok, message)
    }

    pub fn warn(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Status::Warn, message)
    }

    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, Status::Failed, message)
    }

    pub fn count(mut self, key: &'static str, value: usize) -> Self {
        self.counts.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.counts.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Receiver for stage events.
pub trait EventSink {
    fn record(&self, event: &StageEvent);
}

/// Send an event to `sink`, if one was supplied.
pub fn emit(sink: Option<&dyn EventSink>, event: StageEvent) {
    if let Some(sink) = sink {
        sink.record(&event);
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &StageEvent) {
        let counts = fmt_counts(&event.counts);
        let stage = event.stage.as_str();
        match event.status {
            Status::Ok => tracing::info!(stage, counts = %counts, "{}", event.message),
            Status::Warn => tracing::warn!(stage, counts = %counts, "{}", event.message),
            Status::Failed => tracing::error!(stage, counts = %counts, "{}", event.message),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<StageEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events.borrow().clone()
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<StageEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &StageEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

fn fmt_counts(counts: &[(&'static str, usize)]) -> String {
    counts
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order_and_counts() {
        let sink = RecordingSink::new();
        emit(Some(&sink), StageEvent::ok(Stage::Batching, "planned").count("batches", 2));
        emit(Some(&sink), StageEvent::warn(Stage::Fetch, "batch 2 failed"));
        emit(None, StageEvent::failed(Stage::Fetch, "dropped"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].get("batches"), Some(2));
        assert_eq!(events[1].status, Status::Warn);
        assert_eq!(sink.by_stage(Stage::Fetch).len(), 1);
    }

    #[test]
    fn counts_render_as_key_value_pairs() {
        assert_eq!(fmt_counts(&[("rows", 10), ("groups", 2)]), "rows=10 groups=2");
        assert_eq!(fmt_counts(&[]), "");
    }
}
