// crates/datamart-core/src/paginator.rs
// ============================================================================
// Module: Event Paginator
// Description: Bounded-retry traversal of the paginated events feed.
// Purpose: Drain the feed for one date as a lazy sequence of batches.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`EventPaginator`] walks the events feed page by page as an explicit state
//! machine ([`PaginatorState`]). Malformed pages are retried with a fixed
//! backoff against a single error budget shared by the whole drain; transport
//! failures are not retried.
//! Invariants:
//! - A page carrying `next_page` is emitted as one [`EventBatch`].
//! - A page without `next_page` ends the drain in [`PaginatorState::Done`];
//!   its events are not emitted.
//! - Each malformed page consumes one budget unit and one backoff wait; with
//!   a zero budget the first malformed page fails the drain without waiting.
//! - After a terminal state the iterator yields `None` forever.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::interfaces::GatewayError;
use crate::interfaces::RawDataGateway;
use crate::interfaces::Sleeper;
use crate::model::EventBatch;
use crate::model::EventPage;
use crate::model::ReportDate;
use crate::telemetry::PipelineEvent;
use crate::telemetry::PipelineEventSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Malformed pages tolerated across one drain.
pub const DEFAULT_ERROR_BUDGET: u32 = 10;
/// Fixed wait before refetching a malformed page.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Retry policy for one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPolicy {
    /// Malformed pages tolerated before failing.
    pub error_budget: u32,
    /// Wait before each refetch.
    pub backoff: Duration,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            error_budget: DEFAULT_ERROR_BUDGET,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Why a drain completed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// Final page had a `data` field but no cursor.
    Exhausted,
    /// Final page had neither `data` nor a cursor; the feed shape may have changed.
    ContractDrift,
}

/// Paginator state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginatorState {
    /// Next step fetches the page at `cursor`.
    Fetching {
        /// Cursor of the page to fetch (`None` for the first page).
        cursor: Option<String>,
        /// Remaining error budget.
        errors_remaining: u32,
    },
    /// Last fetch of `cursor` was malformed; backoff already waited.
    Retrying {
        /// Cursor of the page to refetch.
        cursor: Option<String>,
        /// Remaining error budget.
        errors_remaining: u32,
    },
    /// Feed completed normally.
    Done(FeedEnd),
    /// Feed stopped on an error.
    Failed,
}

impl PaginatorState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed)
    }
}

/// Errors that stop a drain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// Every unit of the error budget was spent on malformed pages.
    #[error("events feed gave {malformed_pages} malformed pages; last failure: {last_error}")]
    BudgetExhausted {
        /// Malformed pages seen during the drain.
        malformed_pages: u32,
        /// Decode failure of the last malformed page.
        last_error: String,
    },
    /// Request failed below the payload level.
    #[error("events feed request failed: {0}")]
    Transport(GatewayError),
}

// ============================================================================
// SECTION: Paginator
// ============================================================================

/// Lazy drain of the events feed for one date.
pub struct EventPaginator<'a, G: RawDataGateway + ?Sized> {
    /// Feed source.
    gateway: &'a G,
    /// Date being drained.
    date: ReportDate,
    /// Retry policy.
    policy: PaginationPolicy,
    /// Backoff wait implementation.
    sleeper: &'a dyn Sleeper,
    /// Event sink for warnings and completion records.
    sink: &'a dyn PipelineEventSink,
    /// Current state.
    state: PaginatorState,
    /// Batches emitted so far.
    batches_emitted: u32,
    /// Malformed pages seen so far.
    malformed_pages: u32,
    /// Decode failure of the most recent malformed page.
    last_error: Option<String>,
}

/// Starts draining the events feed for `date`.
pub fn drain<'a, G: RawDataGateway + ?Sized>(
    gateway: &'a G,
    date: ReportDate,
    policy: PaginationPolicy,
    sleeper: &'a dyn Sleeper,
    sink: &'a dyn PipelineEventSink,
) -> EventPaginator<'a, G> {
    EventPaginator {
        gateway,
        date,
        policy,
        sleeper,
        sink,
        state: PaginatorState::Fetching {
            cursor: None,
            errors_remaining: policy.error_budget,
        },
        batches_emitted: 0,
        malformed_pages: 0,
        last_error: None,
    }
}

impl<G: RawDataGateway + ?Sized> EventPaginator<'_, G> {
    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &PaginatorState {
        &self.state
    }

    /// Returns the number of batches emitted so far.
    #[must_use]
    pub const fn batches_emitted(&self) -> u32 {
        self.batches_emitted
    }

    /// Returns the number of malformed pages seen so far.
    #[must_use]
    pub const fn malformed_pages(&self) -> u32 {
        self.malformed_pages
    }

    /// Handles a page that decoded successfully.
    fn on_page(&mut self, page: EventPage, errors_remaining: u32) -> Option<EventBatch> {
        match page.next_page {
            Some(next) => {
                self.batches_emitted += 1;
                self.state = PaginatorState::Fetching {
                    cursor: Some(next.clone()),
                    errors_remaining,
                };
                Some(EventBatch {
                    events: page.events.unwrap_or_default(),
                    next_page: Some(next),
                })
            }
            None => {
                let end = match &page.events {
                    Some(events) => {
                        self.sink.record(
                            &PipelineEvent::info("events_feed_exhausted", "events feed exhausted")
                                .for_date(self.date)
                                .with_field("batches", self.batches_emitted)
                                .with_field("unemitted_events", events.len()),
                        );
                        FeedEnd::Exhausted
                    }
                    None => {
                        self.sink.record(
                            &PipelineEvent::warn(
                                "events_contract_drift",
                                "events page has neither data nor next_page; stopping",
                            )
                            .for_date(self.date)
                            .with_field("batches", self.batches_emitted),
                        );
                        FeedEnd::ContractDrift
                    }
                };
                self.state = PaginatorState::Done(end);
                None
            }
        }
    }

    /// Handles a malformed page: spend budget, warn, and wait.
    ///
    /// With no budget left there is nothing to wait for; the next step fails.
    fn on_malformed(
        &mut self,
        cursor: Option<String>,
        errors_remaining: u32,
        error: &GatewayError,
    ) {
        let spent = errors_remaining.checked_sub(1);
        self.malformed_pages += 1;
        self.last_error = Some(error.to_string());
        self.sink.record(
            &PipelineEvent::warn("events_page_malformed", error.to_string())
                .for_date(self.date)
                .with_field("cursor", cursor.clone())
                .with_field("errors_remaining", spent.unwrap_or(0)),
        );
        if spent.is_some() {
            self.sleeper.sleep(self.policy.backoff);
        }
        self.state = PaginatorState::Retrying {
            cursor,
            errors_remaining: spent.unwrap_or(0),
        };
    }

    /// Moves to `Failed` and builds the error yielded to the caller.
    fn fail(&mut self, error: PaginationError) -> PaginationError {
        self.sink.record(
            &PipelineEvent::warn("events_feed_failed", error.to_string())
                .for_date(self.date)
                .with_field("batches", self.batches_emitted)
                .with_field("malformed_pages", self.malformed_pages),
        );
        self.state = PaginatorState::Failed;
        error
    }
}

impl<G: RawDataGateway + ?Sized> Iterator for EventPaginator<'_, G> {
    type Item = Result<EventBatch, PaginationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, PaginatorState::Failed) {
                PaginatorState::Fetching {
                    cursor,
                    errors_remaining,
                } => match self.gateway.get_events_page(self.date, cursor.as_deref()) {
                    Ok(page) => return self.on_page(page, errors_remaining).map(Ok),
                    Err(err) if err.is_decode() => {
                        self.on_malformed(cursor, errors_remaining, &err);
                    }
                    Err(err) => return Some(Err(self.fail(PaginationError::Transport(err)))),
                },
                PaginatorState::Retrying {
                    cursor,
                    errors_remaining,
                } => {
                    if errors_remaining == 0 {
                        let error = PaginationError::BudgetExhausted {
                            malformed_pages: self.malformed_pages,
                            last_error: self.last_error.clone().unwrap_or_default(),
                        };
                        return Some(Err(self.fail(error)));
                    }
                    self.state = PaginatorState::Fetching {
                        cursor,
                        errors_remaining,
                    };
                }
                terminal @ (PaginatorState::Done(_) | PaginatorState::Failed) => {
                    self.state = terminal;
                    return None;
                }
            }
        }
    }
}
