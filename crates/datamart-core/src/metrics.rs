// crates/datamart-core/src/metrics.rs
// ============================================================================
// Module: Datamart Metrics
// Description: CPI, net revenue, and ROAS derivation for one report date.
// Purpose: Pure KPI arithmetic over already-fetched payloads.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! KPI derivation is pure: no I/O, no defaults. Zero-install and zero-cost
//! days surface [`MetricsError::DivideByZero`] instead of a sentinel value so
//! the caller never persists an undefined ratio.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::model::DatamartRow;
use crate::model::OrderLine;
use crate::model::ReportDate;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Arithmetic failures raised while deriving KPIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// A ratio was requested with a zero denominator.
    #[error("cannot derive {metric}: {denominator} is zero")]
    DivideByZero {
        /// Metric being derived.
        metric: &'static str,
        /// Denominator that was zero.
        denominator: &'static str,
    },
}

// ============================================================================
// SECTION: KPIs
// ============================================================================

/// Cost per install: `costs / installs`.
///
/// # Errors
///
/// Returns [`MetricsError::DivideByZero`] when `installs` is zero.
#[allow(clippy::cast_precision_loss, reason = "Install counts stay far below 2^52.")]
pub fn cpi(costs: f64, installs: u64) -> Result<f64, MetricsError> {
    if installs == 0 {
        return Err(MetricsError::DivideByZero {
            metric: "cpi",
            denominator: "installs",
        });
    }
    Ok(costs / installs as f64)
}

/// Net revenue: `Σprice − Σtax − Σfee − Σdiscount`. Empty input yields `0`.
#[must_use]
pub fn revenue(lines: &[OrderLine]) -> f64 {
    let price: f64 = lines.iter().map(|line| line.price).sum();
    let tax: f64 = lines.iter().map(|line| line.tax).sum();
    let fee: f64 = lines.iter().map(|line| line.fee).sum();
    let discount: f64 = lines.iter().map(|line| line.discount).sum();
    price - tax - fee - discount
}

/// Return on ad spend: `revenue / costs`.
///
/// # Errors
///
/// Returns [`MetricsError::DivideByZero`] when `costs` is zero.
pub fn roas(revenue: f64, costs: f64) -> Result<f64, MetricsError> {
    if costs == 0.0 {
        return Err(MetricsError::DivideByZero {
            metric: "roas",
            denominator: "costs",
        });
    }
    Ok(revenue / costs)
}

/// Derives the complete datamart row for `date`.
///
/// # Errors
///
/// Returns [`MetricsError`] when either ratio has a zero denominator.
pub fn derive_row(
    date: ReportDate,
    costs: f64,
    installs: u64,
    lines: &[OrderLine],
) -> Result<DatamartRow, MetricsError> {
    let cpi = cpi(costs, installs)?;
    let revenue = revenue(lines);
    let roas = roas(revenue, costs)?;
    Ok(DatamartRow {
        date,
        cpi,
        revenue,
        roas,
    })
}
