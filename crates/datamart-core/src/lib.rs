// crates/datamart-core/src/lib.rs
// ============================================================================
// Module: Datamart Core
// Description: Domain model, KPI derivation, and the daily update pipeline.
// Purpose: Provide a backend-agnostic marketing datamart engine.
// Dependencies: csv, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! This crate owns the marketing datamart: a date-keyed table of CPI, revenue,
//! and ROAS rows. It defines the raw data and storage interfaces, the KPI
//! formulas, the events feed paginator, and the [`Orchestrator`] that runs a
//! single daily update.
//! Invariants:
//! - The table holds at most one row per report date.
//! - Re-running an update for the same date and inputs is idempotent.
//! - Nothing is persisted unless every prior step succeeded.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod interfaces;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod paginator;
pub mod table;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use interfaces::DatamartStore;
pub use interfaces::GatewayError;
pub use interfaces::RawDataGateway;
pub use interfaces::Sleeper;
pub use interfaces::StoreError;
pub use interfaces::ThreadSleeper;
pub use memory::InMemoryDatamartStore;
pub use metrics::MetricsError;
pub use metrics::derive_row;
pub use model::CostLine;
pub use model::CostReport;
pub use model::DatamartRow;
pub use model::EventBatch;
pub use model::EventPage;
pub use model::EventRecord;
pub use model::InstallCount;
pub use model::InvalidReportDate;
pub use model::OrderLine;
pub use model::ReportDate;
pub use orchestrator::EventIngestion;
pub use orchestrator::EventSummary;
pub use orchestrator::Orchestrator;
pub use orchestrator::RunError;
pub use orchestrator::RunOptions;
pub use orchestrator::RunReport;
pub use paginator::EventPaginator;
pub use paginator::FeedEnd;
pub use paginator::PaginationError;
pub use paginator::PaginationPolicy;
pub use paginator::PaginatorState;
pub use paginator::drain;
pub use table::DATAMART_COLUMNS;
pub use table::DatamartTable;
pub use table::TableError;
pub use table::UpsertOutcome;
pub use telemetry::EventLevel;
pub use telemetry::FileEventSink;
pub use telemetry::MemoryEventSink;
pub use telemetry::NoopEventSink;
pub use telemetry::PipelineEvent;
pub use telemetry::PipelineEventSink;
pub use telemetry::StderrEventSink;
