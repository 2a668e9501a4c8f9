// crates/datamart-config/src/config.rs
// ============================================================================
// Module: Datamart Configuration
// Description: Configuration loading and validation for the datamart job.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: datamart-core, datamart-gateway, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed before any network or storage
//! access happens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use datamart_core::EventIngestion;
use datamart_core::PaginationPolicy;
use datamart_gateway::HttpGatewayConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "datamart.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DATAMART_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default object key of the persisted datamart.
pub const DEFAULT_DATAMART_KEY: &str = "DataMart_data/DataMart.csv";
/// Upper bound on the events error budget.
pub(crate) const MAX_ERROR_BUDGET: u32 = 1_000;
/// Upper bound on the events backoff in milliseconds.
pub(crate) const MAX_BACKOFF_MS: u64 = 10 * 60 * 1_000;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Datamart job configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatamartConfig {
    /// Partner API access.
    pub gateway: HttpGatewayConfig,
    /// Persisted datamart location.
    pub storage: StorageConfig,
    /// Events feed ingestion.
    #[serde(default)]
    pub events: EventsConfig,
    /// Run log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DatamartConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates TOML configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.storage.validate()?;
        self.events.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Datamart storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Object-store backed datamart.
    ObjectStore(ObjectStoreConfig),
    /// Local file datamart.
    File(FileStoreConfig),
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::ObjectStore(config) => config.validate(),
            Self::File(config) => config.validate(),
        }
    }
}

/// Supported object-store providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreProvider {
    /// Amazon S3 compatible object storage.
    S3,
}

/// Object-store configuration for the datamart object.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Provider selection for the object store.
    pub provider: ObjectStoreProvider,
    /// Bucket holding the datamart.
    pub bucket: String,
    /// Object key of the datamart, relative to `prefix`.
    #[serde(default = "default_datamart_key")]
    pub key: String,
    /// Optional region (defaults to environment).
    #[serde(default)]
    pub region: Option<String>,
    /// Optional object-store endpoint (S3-compatible).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional key prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Force path-style addressing (S3-compatible).
    #[serde(default)]
    pub force_path_style: bool,
    /// Allow non-TLS endpoints (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
}

impl ObjectStoreConfig {
    /// Validates object-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when object-store settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must be set".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            let trimmed = endpoint.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                return Err(ConfigError::Invalid(
                    "storage.endpoint must include http:// or https://".to_string(),
                ));
            }
            if trimmed.starts_with("http://") && !self.allow_http {
                return Err(ConfigError::Invalid(
                    "storage.endpoint uses http:// without allow_http".to_string(),
                ));
            }
        }
        if let Some(region) = &self.region
            && region.trim().is_empty()
        {
            return Err(ConfigError::Invalid("storage.region must be non-empty".to_string()));
        }
        if let Some(prefix) = &self.prefix {
            validate_object_path("storage.prefix", prefix, true)?;
        }
        validate_object_path("storage.key", &self.key, false)
    }
}

/// Local file configuration for the datamart.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStoreConfig {
    /// Path of the datamart CSV file.
    pub path: String,
}

impl FileStoreConfig {
    /// Validates file storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.path", &self.path)
    }
}

/// Default object key for the datamart.
fn default_datamart_key() -> String {
    DEFAULT_DATAMART_KEY.to_string()
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Events feed ingestion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Whether and how the events feed is drained.
    pub mode: EventIngestion,
    /// Malformed pages tolerated across one drain.
    pub error_budget: u32,
    /// Wait before refetching a malformed page, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        let policy = PaginationPolicy::default();
        Self {
            mode: EventIngestion::Skip,
            error_budget: policy.error_budget,
            backoff_ms: u64::try_from(policy.backoff.as_millis()).unwrap_or(5_000),
        }
    }
}

impl EventsConfig {
    /// Returns the paginator retry policy.
    #[must_use]
    pub const fn pagination(&self) -> PaginationPolicy {
        PaginationPolicy {
            error_budget: self.error_budget,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// Validates events configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.error_budget == 0 {
            return Err(ConfigError::Invalid("events.error_budget must be at least 1".to_string()));
        }
        if self.error_budget > MAX_ERROR_BUDGET {
            return Err(ConfigError::Invalid(format!(
                "events.error_budget must be at most {MAX_ERROR_BUDGET}"
            )));
        }
        if self.backoff_ms > MAX_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "events.backoff_ms must be at most {MAX_BACKOFF_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Run log destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `logging.path`.
    File,
    /// Discard run logs.
    None,
}

/// Run log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log destination.
    pub sink: LogSinkKind,
    /// Log file path (file sink only).
    pub path: Option<String>,
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (LogSinkKind::File, Some(path)) => validate_path_string("logging.path", path),
            (LogSinkKind::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("logging.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a filesystem path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an object-store key or prefix: relative, no traversal, no
/// backslashes. A prefix may end with `/`.
fn validate_object_path(field: &str, value: &str, is_prefix: bool) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.contains('\\') {
        return Err(ConfigError::Invalid(format!("{field} must not contain backslashes")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if trimmed.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must be relative")));
    }
    let normalized = if is_prefix { trimmed.strip_suffix('/').unwrap_or(trimmed) } else { trimmed };
    if normalized.ends_with('/') || normalized.contains("//") {
        return Err(ConfigError::Invalid(format!("{field} has an empty segment")));
    }
    for component in Path::new(normalized).components() {
        match component {
            Component::Normal(segment) => {
                if segment.to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
                    return Err(ConfigError::Invalid(format!("{field} segment too long")));
                }
            }
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be relative without traversal"
                )));
            }
        }
    }
    Ok(())
}
