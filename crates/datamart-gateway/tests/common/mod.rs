// crates/datamart-gateway/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Local HTTP fixtures and Parquet builders for gateway tests.
// Purpose: Serve canned partner API responses without network access.
// Dependencies: arrow, parquet, tiny_http
// ============================================================================

//! ## Overview
//! Provides a scripted `tiny_http` server that records requests and a helper
//! that encodes order batches as Parquet.

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

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use arrow::array::ArrayRef;
use arrow::array::Float64Array;
use arrow::array::Int64Array;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: HTTP Fixture
// ============================================================================

/// Request observed by the fixture server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request path and query.
    pub url: String,
    /// Header values keyed by lowercase name.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Returns the first value of `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves `responses.len()` requests; each request receives the first
/// response whose path prefix matches the request URL.
pub fn spawn_server(
    responses: Vec<(&'static str, u16, Vec<u8>)>,
) -> (String, JoinHandle<Vec<RecordedRequest>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base_url = format!("http://{addr}/api");
    let expected = responses.len();
    let handle = thread::spawn(move || {
        let mut recorded = Vec::new();
        for _ in 0 .. expected {
            let Ok(request) = server.recv() else {
                break;
            };
            let url = request.url().to_string();
            let headers = request
                .headers()
                .iter()
                .map(|header| (header.field.to_string(), header.value.to_string()))
                .collect();
            let (status, body) = responses
                .iter()
                .find(|(prefix, _, _)| url.starts_with(prefix))
                .map_or((404, Vec::new()), |(_, status, body)| (*status, body.clone()));
            let _ = request.respond(Response::from_data(body).with_status_code(status));
            recorded.push(RecordedRequest {
                url,
                headers,
            });
        }
        recorded
    });
    (base_url, handle)
}

// ============================================================================
// SECTION: Parquet Fixture
// ============================================================================

/// Encodes `columns` as a single-batch Parquet file.
pub fn parquet_bytes(columns: Vec<(&str, ArrayRef)>) -> Vec<u8> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buffer
}

/// Reference orders: two lines netting to a revenue of 41.
pub fn reference_orders() -> Vec<u8> {
    parquet_bytes(vec![
        ("iap_item.price", Arc::new(Float64Array::from(vec![30.0, 20.0])) as ArrayRef),
        ("tax", Arc::new(Int64Array::from(vec![1, 0])) as ArrayRef),
        ("fee", Arc::new(Float64Array::from(vec![2.0, 1.0])) as ArrayRef),
        ("discount.amount", Arc::new(Float64Array::from(vec![None, Some(5.0)])) as ArrayRef),
        ("currency", Arc::new(Int64Array::from(vec![840, 840])) as ArrayRef),
    ])
}
