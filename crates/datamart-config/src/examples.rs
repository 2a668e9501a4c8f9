// crates/datamart-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for new deployments.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for the datamart configuration. The output is static and
//! must always pass [`crate::DatamartConfig::parse`].

/// Returns a canonical example `datamart.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[gateway]
base_url = "https://partner.example.com/api"
timeout_ms = 30000
max_response_bytes = 67108864
# cost_dimension = "channel"

[gateway.auth_headers]
Authorization = "replace-me"

[storage]
type = "object_store"
provider = "s3"
bucket = "datamart-bucket"
key = "DataMart_data/DataMart.csv"
# region = "us-east-1"
# endpoint = "https://storage.googleapis.com"
# prefix = "prod"
# force_path_style = false

[events]
mode = "skip"
error_budget = 10
backoff_ms = 5000

[logging]
sink = "stderr"
"#,
    )
}
