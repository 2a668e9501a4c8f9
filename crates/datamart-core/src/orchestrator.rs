// crates/datamart-core/src/orchestrator.rs
// ============================================================================
// Module: Datamart Orchestrator
// Description: One-shot load, fetch, derive, upsert, persist sequence.
// Purpose: Update the datamart with the KPIs of a single report date.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`Orchestrator::run`] performs exactly one datamart update:
//! 1. load the persisted table,
//! 2. fetch costs, installs, and orders,
//! 3. optionally drain the events feed,
//! 4. derive CPI, revenue, and ROAS,
//! 5. upsert the row,
//! 6. persist the whole table.
//!
//! Invariants:
//! - Steps run strictly in order; any failure before step 6 leaves the
//!   persisted table untouched.
//! - Event ingestion failures abort the run only in
//!   [`EventIngestion::Required`] mode.
//! - At most one run may target a given table at a time; nothing here
//!   enforces it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::interfaces::DatamartStore;
use crate::interfaces::GatewayError;
use crate::interfaces::RawDataGateway;
use crate::interfaces::Sleeper;
use crate::interfaces::StoreError;
use crate::interfaces::ThreadSleeper;
use crate::metrics::MetricsError;
use crate::metrics::derive_row;
use crate::model::DatamartRow;
use crate::model::ReportDate;
use crate::paginator::FeedEnd;
use crate::paginator::PaginationError;
use crate::paginator::PaginationPolicy;
use crate::paginator::PaginatorState;
use crate::paginator::drain;
use crate::table::DatamartTable;
use crate::table::TableError;
use crate::table::UpsertOutcome;
use crate::telemetry::PipelineEvent;
use crate::telemetry::PipelineEventSink;

// ============================================================================
// SECTION: Options
// ============================================================================

/// How the events feed participates in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventIngestion {
    /// Do not touch the events feed.
    #[default]
    Skip,
    /// Drain the feed; failures are logged and tolerated.
    BestEffort,
    /// Drain the feed; failures abort the run.
    Required,
}

/// Inputs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Date whose KPIs are derived.
    pub report_date: ReportDate,
    /// Events feed participation.
    pub events: EventIngestion,
    /// Retry policy for the events feed.
    pub pagination: PaginationPolicy,
}

impl RunOptions {
    /// Options for `report_date` with events skipped.
    #[must_use]
    pub fn for_date(report_date: ReportDate) -> Self {
        Self {
            report_date,
            events: EventIngestion::Skip,
            pagination: PaginationPolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Outcome of an events drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Batches emitted.
    pub batches: u32,
    /// Events across emitted batches.
    pub events: usize,
    /// Malformed pages retried.
    pub malformed_pages: u32,
    /// Terminal state label: `exhausted`, `contract_drift`, or `failed`.
    pub outcome: &'static str,
    /// Failure message when the drain failed.
    pub error: Option<String>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Row written to the datamart.
    pub row: DatamartRow,
    /// True when the row replaced an existing row for the date.
    pub replaced_existing: bool,
    /// Rows in the persisted table.
    pub table_rows: usize,
    /// Storage location that was written.
    pub location: String,
    /// Events drain summary, when ingestion was enabled.
    pub events: Option<EventSummary>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Persisted table could not be read from the store.
    #[error("failed to load datamart: {0}")]
    Load(StoreError),
    /// Persisted table could not be parsed or encoded.
    #[error(transparent)]
    Table(#[from] TableError),
    /// A raw data request failed.
    #[error("failed to fetch {resource}: {error}")]
    Gateway {
        /// Resource being fetched.
        resource: &'static str,
        /// Underlying gateway error.
        error: GatewayError,
    },
    /// Events drain failed in required mode.
    #[error("events ingestion failed: {0}")]
    Events(PaginationError),
    /// KPI derivation failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    /// Updated table could not be written.
    #[error("failed to persist datamart: {0}")]
    Persist(StoreError),
}

impl RunError {
    /// Stable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Load(_) | Self::Persist(_) => "store",
            Self::Table(_) => "table",
            Self::Gateway {
                error: GatewayError::Decode(_),
                ..
            } => "decode",
            Self::Gateway {
                ..
            } => "transport",
            Self::Events(_) => "events",
            Self::Metrics(_) => "arithmetic",
        }
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Wires the gateway, store, and event sink for one run.
pub struct Orchestrator<'a> {
    /// Raw data source.
    gateway: &'a dyn RawDataGateway,
    /// Datamart persistence.
    store: &'a dyn DatamartStore,
    /// Run log sink.
    sink: &'a dyn PipelineEventSink,
    /// Backoff wait used by the events paginator.
    sleeper: &'a dyn Sleeper,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator that sleeps on the current thread between retries.
    #[must_use]
    pub fn new(
        gateway: &'a dyn RawDataGateway,
        store: &'a dyn DatamartStore,
        sink: &'a dyn PipelineEventSink,
    ) -> Self {
        Self {
            gateway,
            store,
            sink,
            sleeper: &ThreadSleeper,
        }
    }

    /// Replaces the backoff wait implementation.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Runs one datamart update.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when any step fails; nothing is persisted then.
    pub fn run(&self, options: &RunOptions) -> Result<RunReport, RunError> {
        let date = options.report_date;
        self.sink.record(
            &PipelineEvent::info("run_started", "datamart update started")
                .for_date(date)
                .with_field("location", self.store.location()),
        );
        let result = self.run_steps(options);
        if let Err(err) = &result {
            self.sink.record(
                &PipelineEvent::error("run_failed", err.to_string())
                    .for_date(date)
                    .with_field("kind", err.kind()),
            );
        }
        result
    }

    /// Executes the run steps in order.
    fn run_steps(&self, options: &RunOptions) -> Result<RunReport, RunError> {
        let date = options.report_date;

        let persisted = self.store.load().map_err(RunError::Load)?;
        let mut table = DatamartTable::load(persisted.as_deref())?;
        self.sink.record(
            &PipelineEvent::info("datamart_loaded", "datamart loaded")
                .for_date(date)
                .with_field("existed", persisted.is_some())
                .with_field("rows", table.len())
                .with_field("collapsed_duplicates", table.collapsed_duplicates()),
        );

        let costs = self.gateway.get_costs(date).map_err(|error| RunError::Gateway {
            resource: "costs",
            error,
        })?;
        let installs = self.gateway.get_installs(date).map_err(|error| RunError::Gateway {
            resource: "installs",
            error,
        })?;
        let orders = self.gateway.get_orders(date).map_err(|error| RunError::Gateway {
            resource: "orders",
            error,
        })?;
        let costs_total = costs.total();
        self.sink.record(
            &PipelineEvent::info("raw_fetched", "raw partner data fetched")
                .for_date(date)
                .with_field("costs", costs_total)
                .with_field("cost_lines", costs.lines.len())
                .with_field("installs", installs.count)
                .with_field("order_lines", orders.len()),
        );

        let events = self.ingest_events(options)?;

        let row = derive_row(date, costs_total, installs.count, &orders)?;
        self.sink.record(
            &PipelineEvent::info("metrics_derived", "kpis derived")
                .for_date(date)
                .with_field("cpi", row.cpi)
                .with_field("revenue", row.revenue)
                .with_field("roas", row.roas),
        );

        let replaced_existing = matches!(table.upsert(row), UpsertOutcome::Replaced { .. });
        self.sink.record(
            &PipelineEvent::info("row_upserted", "datamart row upserted")
                .for_date(date)
                .with_field("replaced_existing", replaced_existing)
                .with_field("rows", table.len()),
        );

        let bytes = table.serialize()?;
        let byte_len = bytes.len();
        self.store.save(bytes).map_err(RunError::Persist)?;
        let location = self.store.location();
        self.sink.record(
            &PipelineEvent::info("datamart_persisted", "datamart persisted")
                .for_date(date)
                .with_field("rows", table.len())
                .with_field("bytes", byte_len)
                .with_field("location", location.clone()),
        );

        Ok(RunReport {
            row,
            replaced_existing,
            table_rows: table.len(),
            location,
            events,
        })
    }

    /// Drains the events feed according to the ingestion mode.
    fn ingest_events(&self, options: &RunOptions) -> Result<Option<EventSummary>, RunError> {
        if options.events == EventIngestion::Skip {
            return Ok(None);
        }
        let date = options.report_date;
        let mut paginator = drain(self.gateway, date, options.pagination, self.sleeper, self.sink);
        let mut events = 0usize;
        let mut failure = None;
        for batch in paginator.by_ref() {
            match batch {
                Ok(batch) => events += batch.events.len(),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let outcome = match paginator.state() {
            PaginatorState::Done(FeedEnd::Exhausted) => "exhausted",
            PaginatorState::Done(FeedEnd::ContractDrift) => "contract_drift",
            _ => "failed",
        };
        let summary = EventSummary {
            batches: paginator.batches_emitted(),
            events,
            malformed_pages: paginator.malformed_pages(),
            outcome,
            error: failure.as_ref().map(ToString::to_string),
        };
        self.sink.record(
            &PipelineEvent::info("events_ingested", "events feed drained")
                .for_date(date)
                .with_field("batches", summary.batches)
                .with_field("events", summary.events)
                .with_field("outcome", outcome),
        );
        match failure {
            Some(err) if options.events == EventIngestion::Required => Err(RunError::Events(err)),
            _ => Ok(Some(summary)),
        }
    }
}
