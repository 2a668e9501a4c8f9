// crates/datamart-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and trigger decoding.
// Purpose: Ensure flags map onto run inputs and trigger payloads fail closed.
// ============================================================================

//! ## Overview
//! Parses `datamart` argument vectors and decodes trigger payloads without
//! touching the network or a datamart.

#![allow(
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

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use datamart_config::LogSinkKind;
use datamart_config::LoggingConfig;
use datamart_core::EventIngestion;
use datamart_core::ReportDate;
use serde_json::json;

use super::Cli;
use super::Commands;
use super::MAX_TRIGGER_BYTES;
use super::build_sink;
use super::decode_trigger;

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn run_flags_parse_date_and_events_mode() {
    let cli = Cli::try_parse_from([
        "datamart",
        "run",
        "--config",
        "prod.toml",
        "--date",
        "2024-05-01",
        "--events",
        "best_effort",
    ])
    .unwrap();
    let Commands::Run(command) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(command.date, Some(ReportDate::parse("2024-05-01").unwrap()));
    assert_eq!(command.events.map(EventIngestion::from), Some(EventIngestion::BestEffort));
    assert_eq!(command.config.unwrap().to_str(), Some("prod.toml"));
}

#[test]
fn run_rejects_malformed_date() {
    assert!(Cli::try_parse_from(["datamart", "run", "--date", "05/01/2024"]).is_err());
}

#[test]
fn run_rejects_unknown_events_mode() {
    assert!(Cli::try_parse_from(["datamart", "run", "--events", "sometimes"]).is_err());
}

// ============================================================================
// SECTION: Trigger Decoding
// ============================================================================

#[test]
fn json_trigger_stays_structured() {
    let encoded = STANDARD.encode(br#"{"source":"scheduler","attempt":1}"#);
    assert_eq!(decode_trigger(&encoded).unwrap(), json!({"source": "scheduler", "attempt": 1}));
}

#[test]
fn text_trigger_is_logged_as_string() {
    let encoded = STANDARD.encode(b"daily tick");
    assert_eq!(decode_trigger(&encoded).unwrap(), json!("daily tick"));
}

#[test]
fn invalid_base64_trigger_fails() {
    let err = decode_trigger("not*base64").unwrap_err();
    assert!(err.to_string().contains("base64"));
}

#[test]
fn non_utf8_trigger_fails() {
    let encoded = STANDARD.encode([0xFF, 0xFE]);
    assert!(decode_trigger(&encoded).unwrap_err().to_string().contains("utf-8"));
}

#[test]
fn oversized_trigger_fails() {
    let encoded = "A".repeat(MAX_TRIGGER_BYTES + 4);
    assert!(decode_trigger(&encoded).unwrap_err().to_string().contains("exceeds"));
}

// ============================================================================
// SECTION: Sink Selection
// ============================================================================

#[test]
fn file_sink_requires_path() {
    let config = LoggingConfig {
        sink: LogSinkKind::File,
        path: None,
    };
    assert!(build_sink(&config).is_err());
}

#[test]
fn file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let config = LoggingConfig {
        sink: LogSinkKind::File,
        path: Some(path.to_string_lossy().into_owned()),
    };
    let sink = build_sink(&config).unwrap();
    sink.record(&datamart_core::PipelineEvent::info("run_started", "started"));
    drop(sink);

    let contents = std::fs::read_to_string(&path).unwrap();
    let line: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(line["event"], "run_started");
}
