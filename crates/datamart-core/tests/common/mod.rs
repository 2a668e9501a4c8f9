// crates/datamart-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fakes for datamart-core tests.
// Purpose: Script gateway responses and count backoff waits deterministically.
// Dependencies: datamart-core, serde_json
// ============================================================================

//! ## Overview
//! Provides a scripted [`RawDataGateway`], a counting [`Sleeper`], and row
//! builders shared by the datamart-core integration tests.

#![allow(
    dead_code,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use datamart_core::CostReport;
use datamart_core::DatamartRow;
use datamart_core::EventPage;
use datamart_core::EventRecord;
use datamart_core::GatewayError;
use datamart_core::InstallCount;
use datamart_core::OrderLine;
use datamart_core::RawDataGateway;
use datamart_core::ReportDate;
use datamart_core::Sleeper;
use serde_json::json;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Parses a report date literal.
pub fn date(value: &str) -> ReportDate {
    ReportDate::parse(value).unwrap()
}

/// Builds a datamart row.
pub fn row(day: &str, cpi: f64, revenue: f64, roas: f64) -> DatamartRow {
    DatamartRow {
        date: date(day),
        cpi,
        revenue,
        roas,
    }
}

/// Builds one order line.
pub const fn order(price: f64, tax: f64, fee: f64, discount: f64) -> OrderLine {
    OrderLine {
        price,
        tax,
        fee,
        discount,
    }
}

/// Builds a well-formed events page with `count` events.
pub fn page(count: usize, next_page: Option<&str>) -> EventPage {
    let events = (0 .. count)
        .map(|index| {
            let mut attributes = BTreeMap::new();
            attributes.insert("event_id".to_string(), json!(index));
            EventRecord {
                attributes,
            }
        })
        .collect();
    EventPage {
        events: Some(events),
        next_page: next_page.map(str::to_string),
    }
}

// ============================================================================
// SECTION: Scripted Gateway
// ============================================================================

/// Gateway returning fixed scalar payloads and a scripted events feed.
pub struct ScriptedGateway {
    /// Cost report response.
    pub costs: Result<CostReport, GatewayError>,
    /// Install count response.
    pub installs: Result<InstallCount, GatewayError>,
    /// Order lines response.
    pub orders: Result<Vec<OrderLine>, GatewayError>,
    /// Events pages served in order.
    pub pages: Mutex<VecDeque<Result<EventPage, GatewayError>>>,
    /// Response served once the script runs out.
    pub fallback_page: Option<Result<EventPage, GatewayError>>,
    /// Cursors requested from the events feed.
    pub cursors: Mutex<Vec<Option<String>>>,
}

impl ScriptedGateway {
    /// Gateway serving the reference payload: costs 100, installs 50, two orders.
    pub fn reference() -> Self {
        Self {
            costs: Ok(CostReport::aggregated(100.0)),
            installs: Ok(InstallCount {
                count: 50,
            }),
            orders: Ok(vec![order(30.0, 1.0, 2.0, 0.0), order(20.0, 0.0, 1.0, 5.0)]),
            pages: Mutex::new(VecDeque::new()),
            fallback_page: None,
            cursors: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the events script.
    pub fn with_pages(self, pages: Vec<Result<EventPage, GatewayError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..self
        }
    }

    /// Serves `page` for every request after the script runs out.
    pub fn with_fallback_page(self, page: Result<EventPage, GatewayError>) -> Self {
        Self {
            fallback_page: Some(page),
            ..self
        }
    }

    /// Returns the cursors requested so far.
    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }
}

impl RawDataGateway for ScriptedGateway {
    fn get_costs(&self, _date: ReportDate) -> Result<CostReport, GatewayError> {
        self.costs.clone()
    }

    fn get_installs(&self, _date: ReportDate) -> Result<InstallCount, GatewayError> {
        self.installs.clone()
    }

    fn get_orders(&self, _date: ReportDate) -> Result<Vec<OrderLine>, GatewayError> {
        self.orders.clone()
    }

    fn get_events_page(
        &self,
        _date: ReportDate,
        cursor: Option<&str>,
    ) -> Result<EventPage, GatewayError> {
        self.cursors.lock().unwrap().push(cursor.map(str::to_string));
        let scripted = self.pages.lock().unwrap().pop_front();
        scripted.or_else(|| self.fallback_page.clone()).unwrap_or_else(|| {
            Err(GatewayError::Transport("events script exhausted".to_string()))
        })
    }
}

// ============================================================================
// SECTION: Counting Sleeper
// ============================================================================

/// Sleeper that records requested waits instead of blocking.
#[derive(Default)]
pub struct CountingSleeper {
    /// Requested waits in order.
    waits: Mutex<Vec<Duration>>,
}

impl CountingSleeper {
    /// Returns the requested waits.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}
