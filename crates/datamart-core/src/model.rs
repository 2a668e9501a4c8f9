// crates/datamart-core/src/model.rs
// ============================================================================
// Module: Datamart Model
// Description: Report dates, datamart rows, and typed raw payloads.
// Purpose: Give every pipeline stage a validated, strongly typed vocabulary.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Typed values exchanged between the gateway, the metrics computer, and the
//! datamart table. Raw payloads are validated once when they are decoded at
//! the gateway boundary; consumers never look fields up by string key.
//! Invariants:
//! - [`ReportDate`] always formats as `YYYY-MM-DD`.
//! - [`DatamartRow`] formulas hold only at derivation time and are not
//!   re-validated on later reads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;
use time::Date;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Report Date
// ============================================================================

/// ISO-8601 calendar date layout used on the wire and in the datamart.
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date a datamart row reports on.
///
/// # Invariants
/// - Serializes and displays as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportDate(Date);

impl ReportDate {
    /// Wraps a calendar date.
    #[must_use]
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    /// Returns the day before `now`'s UTC calendar date.
    ///
    /// Falls back to `now`'s date on the minimum representable date.
    #[must_use]
    pub fn day_before(now: OffsetDateTime) -> Self {
        let today = now.to_offset(UtcOffset::UTC).date();
        Self(today.previous_day().unwrap_or(today))
    }

    /// Returns yesterday relative to the current UTC clock.
    #[must_use]
    pub fn yesterday_utc() -> Self {
        Self::day_before(OffsetDateTime::now_utc())
    }

    /// Returns the wrapped calendar date.
    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }

    /// Parses a `YYYY-MM-DD` string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReportDate`] when the string is not an ISO calendar date.
    pub fn parse(value: &str) -> Result<Self, InvalidReportDate> {
        Date::parse(value.trim(), ISO_DATE)
            .map(Self)
            .map_err(|_| InvalidReportDate(value.to_string()))
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(ISO_DATE).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl FromStr for ReportDate {
    type Err = InvalidReportDate;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for ReportDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReportDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a string is not a valid report date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid report date (expected YYYY-MM-DD): {0}")]
pub struct InvalidReportDate(pub String);

// ============================================================================
// SECTION: Datamart Row
// ============================================================================

/// One day of derived KPIs.
///
/// Field order is the persisted column order: `date, cpi, revenue, roas`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatamartRow {
    /// Reporting date (unique key).
    pub date: ReportDate,
    /// Cost per install.
    pub cpi: f64,
    /// Net in-app-purchase revenue.
    pub revenue: f64,
    /// Return on ad spend.
    pub roas: f64,
}

// ============================================================================
// SECTION: Raw Payloads
// ============================================================================

/// One line of the partner cost report.
#[derive(Debug, Clone, PartialEq)]
pub struct CostLine {
    /// Breakdown label (channel, campaign, ...) when the report is dimensioned.
    pub dimension: Option<String>,
    /// Spend attributed to the line.
    pub cost: f64,
}

/// Cost report for a single date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostReport {
    /// Report lines in source order.
    pub lines: Vec<CostLine>,
}

impl CostReport {
    /// Builds a report holding a single pre-aggregated total.
    #[must_use]
    pub fn aggregated(total: f64) -> Self {
        Self {
            lines: vec![CostLine {
                dimension: None,
                cost: total,
            }],
        }
    }

    /// Returns the total spend across all lines.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|line| line.cost).sum()
    }
}

/// Install counter for a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallCount {
    /// Number of app installs.
    pub count: u64,
}

/// One in-app-purchase order line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Gross item price.
    pub price: f64,
    /// Tax withheld.
    pub tax: f64,
    /// Store fee.
    pub fee: f64,
    /// Discount granted.
    pub discount: f64,
}

/// A single user event from the partner feed.
///
/// # Invariants
/// - The source record was a JSON object; attributes keep their raw values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Raw event attributes keyed by field name.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Decoded response of one events-feed request.
///
/// `events` is `None` when the response carried no `data` field at all, which
/// is how an incompatible feed shape is told apart from an exhausted feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    /// Events carried by the page, when the `data` field was present.
    pub events: Option<Vec<EventRecord>>,
    /// Continuation cursor, when more pages are available.
    pub next_page: Option<String>,
}

/// Batch of events emitted by the paginator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    /// Events in feed order.
    pub events: Vec<EventRecord>,
    /// Cursor for the page that follows this batch.
    pub next_page: Option<String>,
}
