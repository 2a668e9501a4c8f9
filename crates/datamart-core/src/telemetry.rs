// crates/datamart-core/src/telemetry.rs
// ============================================================================
// Module: Pipeline Telemetry
// Description: Structured pipeline events and the sinks that record them.
// Purpose: Emit JSON-line run logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every observable step of a run is a [`PipelineEvent`] recorded through a
//! [`PipelineEventSink`]. Sinks serialize events as JSON lines so deployments
//! can route them to their preferred logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::model::ReportDate;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity attached to a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Normal progress.
    Info,
    /// Recoverable or suspicious condition.
    Warn,
    /// Run-terminating failure.
    Error,
}

/// Structured pipeline event payload.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event severity.
    pub level: EventLevel,
    /// Report date the event belongs to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<ReportDate>,
    /// Human-readable summary.
    pub message: String,
    /// Additional structured fields.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl PipelineEvent {
    /// Creates an event with a consistent timestamp.
    #[must_use]
    pub fn new(event: &'static str, level: EventLevel, message: impl Into<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            level,
            report_date: None,
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Creates an info-level event.
    #[must_use]
    pub fn info(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Info, message)
    }

    /// Creates a warn-level event.
    #[must_use]
    pub fn warn(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Warn, message)
    }

    /// Creates an error-level event.
    #[must_use]
    pub fn error(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, EventLevel::Error, message)
    }

    /// Attaches the report date.
    #[must_use]
    pub const fn for_date(mut self, date: ReportDate) -> Self {
        self.report_date = Some(date);
        self
    }

    /// Attaches a structured field.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for pipeline events.
pub trait PipelineEventSink: Send + Sync {
    /// Record a pipeline event.
    fn record(&self, event: &PipelineEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl PipelineEventSink for StderrEventSink {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl PipelineEventSink for FileEventSink {
    fn record(&self, event: &PipelineEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
        }
    }
}

/// Sink that drops every event.
pub struct NoopEventSink;

impl PipelineEventSink for NoopEventSink {
    fn record(&self, _event: &PipelineEvent) {}
}

/// Sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Recorded events in emission order.
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded event identifiers in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|event| event.event).collect()
    }
}

impl PipelineEventSink for MemoryEventSink {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
