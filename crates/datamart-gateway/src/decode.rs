// crates/datamart-gateway/src/decode.rs
// ============================================================================
// Module: Payload Decoders
// Description: Decoders for the partner API's TSV, JSON, and Parquet bodies.
// Purpose: Validate raw payloads once and hand typed values to the pipeline.
// Dependencies: arrow, bytes, csv, datamart-core, parquet, serde_json
// ============================================================================

//! ## Overview
//! Each decoder turns one response body into a typed payload and reports any
//! shape mismatch as [`GatewayError::Decode`].
//! Invariants:
//! - Decoders never panic on untrusted input.
//! - Numeric order columns of any width are widened to `f64`; nulls count as `0`.
//! - An events page missing `data` decodes with `events = None` so callers can
//!   tell contract drift from an exhausted feed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use arrow::array::Array;
use arrow::array::ArrayRef;
use arrow::array::Float64Array;
use arrow::array::StructArray;
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use csv::ReaderBuilder;
use csv::Trim;
use datamart_core::CostLine;
use datamart_core::CostReport;
use datamart_core::EventPage;
use datamart_core::EventRecord;
use datamart_core::GatewayError;
use datamart_core::InstallCount;
use datamart_core::OrderLine;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Gross item price column.
pub const PRICE_COLUMN: &str = "iap_item.price";
/// Tax column.
pub const TAX_COLUMN: &str = "tax";
/// Store fee column.
pub const FEE_COLUMN: &str = "fee";
/// Discount column.
pub const DISCOUNT_COLUMN: &str = "discount.amount";

/// Builds a decode error.
fn decode_error(message: impl Into<String>) -> GatewayError {
    GatewayError::Decode(message.into())
}

// ============================================================================
// SECTION: Installs
// ============================================================================

/// Decodes the installs body: `{ "count": <non-negative integer> }`.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] when the body is not that object.
pub fn decode_installs(body: &[u8]) -> Result<InstallCount, GatewayError> {
    serde_json::from_slice(body).map_err(|err| decode_error(format!("installs: {err}")))
}

// ============================================================================
// SECTION: Costs
// ============================================================================

/// Decodes the tab-separated cost report.
///
/// The first line is a header. Every following line contributes one
/// [`CostLine`]; its last field is the cost and any leading fields form the
/// dimension label. For the usual `dimension<TAB>cost` report the cost is
/// the second column; a single-column body is a pre-aggregated total.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] for empty bodies, non-UTF-8 text, rows
/// whose field count differs from the header, or non-numeric costs.
pub fn decode_costs(body: &[u8]) -> Result<CostReport, GatewayError> {
    let text = std::str::from_utf8(body).map_err(|_| decode_error("costs: body is not utf-8"))?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let width = reader.headers().map_err(|err| decode_error(format!("costs: {err}")))?.len();
    if width == 0 {
        return Err(decode_error("costs: body is empty"));
    }
    let mut lines = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| decode_error(format!("costs: {err}")))?;
        // A short row would shift a dimension value into the cost column.
        if record.len() != width {
            return Err(decode_error(format!(
                "costs row {}: expected {width} fields, found {}",
                index + 1,
                record.len()
            )));
        }
        let Some(raw) = record.iter().last() else {
            continue;
        };
        let cost = raw
            .parse::<f64>()
            .ok()
            .filter(|cost| cost.is_finite())
            .ok_or_else(|| decode_error(format!("costs row {}: '{raw}' is not a number", index + 1)))?;
        let dimension = (record.len() > 1)
            .then(|| record.iter().take(record.len() - 1).collect::<Vec<_>>().join("\t"));
        lines.push(CostLine {
            dimension,
            cost,
        });
    }
    Ok(CostReport {
        lines,
    })
}

// ============================================================================
// SECTION: Orders
// ============================================================================

/// Decodes the Parquet orders body into one [`OrderLine`] per row.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] when the body is not Parquet, or a
/// required column is missing or non-numeric.
pub fn decode_orders(body: Bytes) -> Result<Vec<OrderLine>, GatewayError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(body)
        .map_err(|err| decode_error(format!("orders: parquet reader init failed: {err}")))?
        .build()
        .map_err(|err| decode_error(format!("orders: parquet reader build failed: {err}")))?;

    let mut lines = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|err| decode_error(format!("orders: parquet read batch failed: {err}")))?;
        let price = numeric_column(&batch, PRICE_COLUMN)?;
        let tax = numeric_column(&batch, TAX_COLUMN)?;
        let fee = numeric_column(&batch, FEE_COLUMN)?;
        let discount = numeric_column(&batch, DISCOUNT_COLUMN)?;
        for row in 0 .. batch.num_rows() {
            lines.push(OrderLine {
                price: value_or_zero(&price, row),
                tax: value_or_zero(&tax, row),
                fee: value_or_zero(&fee, row),
                discount: value_or_zero(&discount, row),
            });
        }
    }
    Ok(lines)
}

/// Resolves `path` as a flat column name, falling back to `parent.child`
/// inside a struct column.
fn column_by_path(batch: &RecordBatch, path: &str) -> Option<ArrayRef> {
    if let Some(column) = batch.column_by_name(path) {
        return Some(column.clone());
    }
    let (parent, child) = path.split_once('.')?;
    let parent = batch.column_by_name(parent)?;
    let parent = parent.as_any().downcast_ref::<StructArray>()?;
    parent.column_by_name(child).cloned()
}

/// Returns the column at `path` widened to `f64`.
fn numeric_column(batch: &RecordBatch, path: &str) -> Result<Float64Array, GatewayError> {
    let column = column_by_path(batch, path)
        .ok_or_else(|| decode_error(format!("orders: missing column '{path}'")))?;
    let data_type = column.data_type();
    if !data_type.is_numeric() && data_type != &DataType::Null {
        return Err(decode_error(format!("orders: column '{path}' is {data_type}, not numeric")));
    }
    let widened = cast(column.as_ref(), &DataType::Float64)
        .map_err(|err| decode_error(format!("orders: column '{path}': {err}")))?;
    widened
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| decode_error(format!("orders: column '{path}' did not widen to f64")))
}

/// Reads `row`, treating nulls as zero.
fn value_or_zero(array: &Float64Array, row: usize) -> f64 {
    if array.is_null(row) { 0.0 } else { array.value(row) }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Decodes one events page: `{ "data": [ {..}, .. ], "next_page": "..." }`.
///
/// A missing or null `data` yields `events = None`. A missing, null, or empty
/// `next_page` yields no cursor.
///
/// # Errors
///
/// Returns [`GatewayError::Decode`] when the body is not a JSON object, when
/// `data` is not an array of objects, or when `next_page` is not a string.
pub fn decode_events_page(body: &[u8]) -> Result<EventPage, GatewayError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| decode_error(format!("events: {err}")))?;
    let Value::Object(mut page) = value else {
        return Err(decode_error("events: page is not a json object"));
    };

    let events = match page.remove("data") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => Ok(EventRecord {
                        attributes: map.into_iter().collect::<BTreeMap<_, _>>(),
                    }),
                    _ => Err(decode_error(format!("events: data[{index}] is not an object"))),
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(decode_error("events: data is not an array")),
    };

    let next_page = match page.remove("next_page") {
        None | Some(Value::Null) => None,
        Some(Value::String(cursor)) if cursor.is_empty() => None,
        Some(Value::String(cursor)) => Some(cursor),
        Some(_) => return Err(decode_error("events: next_page is not a string")),
    };

    Ok(EventPage {
        events,
        next_page,
    })
}
