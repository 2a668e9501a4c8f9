// crates/datamart-cli/src/main.rs
// ============================================================================
// Module: Datamart CLI Entry Point
// Description: Command dispatcher for the daily datamart batch job.
// Purpose: Run one datamart update, inspect the persisted table, check config.
// Dependencies: clap, base64, datamart-core, datamart-config, datamart-gateway, datamart-store
// ============================================================================

//! ## Overview
//! `datamart run` performs one end-to-end update for a report date (default:
//! yesterday in UTC) and prints the run report as JSON. The job is blocking
//! throughout; no async runtime is entered here.
//!
//! Invariants:
//! - Exit code is non-zero whenever the datamart was not persisted.
//! - A trigger payload is only logged; it never changes run inputs.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use datamart_config::DatamartConfig;
use datamart_config::LogSinkKind;
use datamart_config::LoggingConfig;
use datamart_config::config_toml_example;
use datamart_core::DatamartTable;
use datamart_core::EventIngestion;
use datamart_core::FileEventSink;
use datamart_core::NoopEventSink;
use datamart_core::Orchestrator;
use datamart_core::PipelineEvent;
use datamart_core::PipelineEventSink;
use datamart_core::ReportDate;
use datamart_core::RunOptions;
use datamart_core::StderrEventSink;
use datamart_gateway::HttpGateway;
use datamart_store::build_store;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an encoded trigger payload.
const MAX_TRIGGER_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "datamart", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Update the datamart for one report date.
    Run(RunCommand),
    /// Print the persisted datamart as CSV.
    Show(ShowCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config file path (defaults to `DATAMART_CONFIG` or `datamart.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Report date as YYYY-MM-DD (defaults to yesterday, UTC).
    #[arg(long, value_name = "DATE")]
    date: Option<ReportDate>,
    /// Events feed participation (overrides `[events] mode`).
    #[arg(long, value_enum, value_name = "MODE")]
    events: Option<EventsArg>,
    /// Base64-encoded trigger message that started this run.
    #[arg(long, value_name = "BASE64")]
    trigger: Option<String>,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
struct ShowCommand {
    /// Config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
    /// Print an example config file.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Events mode flag values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EventsArg {
    /// Do not read the events feed.
    Skip,
    /// Read the feed; tolerate failures.
    #[value(name = "best_effort")]
    BestEffort,
    /// Read the feed; fail the run on feed failures.
    Required,
}

impl From<EventsArg> for EventIngestion {
    fn from(value: EventsArg) -> Self {
        match value {
            EventsArg::Skip => Self::Skip,
            EventsArg::BestEffort => Self::BestEffort,
            EventsArg::Required => Self::Required,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Run(command) => command_run(&command),
        Commands::Show(command) => command_show(&command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let sink = build_sink(&config.logging)?;
    let report_date = command.date.unwrap_or_else(ReportDate::yesterday_utc);
    if let Some(trigger) = &command.trigger {
        let payload = decode_trigger(trigger)?;
        sink.record(
            &PipelineEvent::info("trigger_received", "run triggered by message")
                .for_date(report_date)
                .with_field("payload", payload),
        );
    }

    let gateway = HttpGateway::new(config.gateway.clone())
        .map_err(|err| CliError::new(format!("gateway setup failed: {err}")))?;
    let store = build_store(&config.storage)
        .map_err(|err| CliError::new(format!("storage setup failed: {err}")))?;
    let options = RunOptions {
        report_date,
        events: command.events.map_or(config.events.mode, EventIngestion::from),
        pagination: config.events.pagination(),
    };
    let report = Orchestrator::new(&gateway, store.as_ref(), sink.as_ref())
        .run(&options)
        .map_err(|err| CliError::new(format!("datamart run failed: {err}")))?;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| CliError::new(format!("failed to render run report: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Decodes a base64 trigger message into a loggable value.
///
/// JSON payloads are kept structured; anything else is logged as text.
fn decode_trigger(encoded: &str) -> CliResult<Value> {
    let encoded = encoded.trim();
    if encoded.len() > MAX_TRIGGER_BYTES {
        return Err(CliError::new(format!(
            "trigger payload exceeds {MAX_TRIGGER_BYTES} bytes"
        )));
    }
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| CliError::new(format!("trigger payload is not valid base64: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| CliError::new("trigger payload must be utf-8".to_string()))?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

// ============================================================================
// SECTION: Show Command
// ============================================================================

/// Executes the `show` command.
fn command_show(command: &ShowCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let store = build_store(&config.storage)
        .map_err(|err| CliError::new(format!("storage setup failed: {err}")))?;
    let bytes = store
        .load()
        .map_err(|err| CliError::new(format!("failed to load datamart: {err}")))?
        .ok_or_else(|| CliError::new(format!("no datamart at {}", store.location())))?;
    let table = DatamartTable::load(Some(&bytes))
        .map_err(|err| CliError::new(format!("datamart is unreadable: {err}")))?;
    let csv = table
        .serialize()
        .map_err(|err| CliError::new(format!("failed to render datamart: {err}")))?;
    write_stdout_bytes(&csv).map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => {
            load_config(command.config.as_deref())?;
            write_stdout_line("config ok").map_err(|err| CliError::new(output_error(&err)))?;
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error(&err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Wiring Helpers
// ============================================================================

/// Loads configuration with a CLI-facing error.
fn load_config(path: Option<&Path>) -> CliResult<DatamartConfig> {
    DatamartConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Builds the run log sink selected by configuration.
fn build_sink(config: &LoggingConfig) -> CliResult<Box<dyn PipelineEventSink>> {
    match (config.sink, config.path.as_deref()) {
        (LogSinkKind::Stderr, _) => Ok(Box::new(StderrEventSink)),
        (LogSinkKind::None, _) => Ok(Box::new(NoopEventSink)),
        (LogSinkKind::File, Some(path)) => FileEventSink::new(Path::new(path))
            .map(|sink| Box::new(sink) as Box<dyn PipelineEventSink>)
            .map_err(|err| CliError::new(format!("failed to open log file {path}: {err}"))),
        (LogSinkKind::File, None) => {
            Err(CliError::new("logging.path is required for the file sink".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output failure message.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write to stdout: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
