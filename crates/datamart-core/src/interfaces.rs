// crates/datamart-core/src/interfaces.rs
// ============================================================================
// Module: Datamart Interfaces
// Description: Backend-agnostic contracts for raw data, storage, and waiting.
// Purpose: Keep the pipeline independent of HTTP, object storage, and clocks.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The pipeline consumes its collaborators only through these traits:
//! [`RawDataGateway`] for partner data, [`DatamartStore`] for the persisted
//! table, and [`Sleeper`] for the paginator's backoff wait.
//! Invariants:
//! - Gateways return typed payloads validated at the boundary.
//! - Stores report a missing datamart as `Ok(None)`, never as an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::model::CostReport;
use crate::model::EventPage;
use crate::model::InstallCount;
use crate::model::OrderLine;
use crate::model::ReportDate;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by raw data gateways.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Gateway configuration is unusable.
    #[error("gateway config error: {0}")]
    Config(String),
    /// Network or HTTP-level failure.
    #[error("gateway transport error: {0}")]
    Transport(String),
    /// Response arrived but could not be decoded into the expected payload.
    #[error("gateway decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Returns true for malformed-payload failures.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Errors raised by datamart stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store configuration or key is invalid.
    #[error("datamart store invalid: {0}")]
    Invalid(String),
    /// Backend I/O failure.
    #[error("datamart store io error: {0}")]
    Io(String),
    /// Stored object exceeds the size limit.
    #[error("datamart too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Raw Data Gateway
// ============================================================================

/// Read access to the partner analytics API.
pub trait RawDataGateway {
    /// Returns the cost report for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the request or decoding fails.
    fn get_costs(&self, date: ReportDate) -> Result<CostReport, GatewayError>;

    /// Returns the install count for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the request or decoding fails.
    fn get_installs(&self, date: ReportDate) -> Result<InstallCount, GatewayError>;

    /// Returns every order line for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the request or decoding fails.
    fn get_orders(&self, date: ReportDate) -> Result<Vec<OrderLine>, GatewayError>;

    /// Returns one page of the events feed for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Decode`] for malformed pages and
    /// [`GatewayError::Transport`] for request failures.
    fn get_events_page(
        &self,
        date: ReportDate,
        cursor: Option<&str>,
    ) -> Result<EventPage, GatewayError>;
}

// ============================================================================
// SECTION: Datamart Store
// ============================================================================

/// Persistence for the serialized datamart table.
pub trait DatamartStore {
    /// Loads the serialized table, or `None` when nothing was persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrites the persisted table with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn save(&self, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Describes the storage location for logs.
    fn location(&self) -> String;
}

// ============================================================================
// SECTION: Sleeper
// ============================================================================

/// Blocking wait used between paginator retries.
pub trait Sleeper {
    /// Blocks the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
