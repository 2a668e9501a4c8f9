// crates/datamart-gateway/src/lib.rs
// ============================================================================
// Module: Datamart Gateway
// Description: HTTP raw data gateway and payload decoders.
// Purpose: Connect the datamart pipeline to the partner analytics API.
// Dependencies: datamart-core, reqwest, csv, arrow, parquet, serde_json
// ============================================================================

//! ## Overview
//! This crate implements [`datamart_core::RawDataGateway`] over the partner
//! HTTP API. Responses arrive as TSV (costs), JSON (installs, events), and
//! Parquet (orders); each is validated into typed payloads at this boundary.
//! Invariants:
//! - Response bodies are untrusted and size-limited.
//! - Malformed bodies surface as decode errors; request failures and non-2xx
//!   statuses surface as transport errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod decode;
pub mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decode::decode_costs;
pub use decode::decode_events_page;
pub use decode::decode_installs;
pub use decode::decode_orders;
pub use http::HttpGateway;
pub use http::HttpGatewayConfig;
