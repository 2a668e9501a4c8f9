// crates/datamart-config/src/lib.rs
// ============================================================================
// Module: Datamart Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for datamart.toml semantics.
// Dependencies: datamart-core, datamart-gateway, serde, toml
// ============================================================================

//! ## Overview
//! `datamart-config` defines the configuration model for the datamart job:
//! partner API access, datamart storage, events ingestion, and logging. It
//! loads TOML with strict size limits and validates fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
