// crates/datamart-gateway/src/http.rs
// ============================================================================
// Module: HTTP Raw Data Gateway
// Description: Blocking HTTP client for the partner analytics API.
// Purpose: Fetch costs, installs, orders, and events pages with strict limits.
// Dependencies: datamart-core, reqwest, serde
// ============================================================================

//! ## Overview
//! [`HttpGateway`] issues bounded GET requests against the partner API and
//! decodes each body with the decoders in [`crate::decode`]. Connection
//! settings and credentials arrive as an explicit [`HttpGatewayConfig`]; the
//! gateway holds no process-wide state.
//! Invariants:
//! - Configured auth headers are attached to every request.
//! - Redirects are not followed; non-2xx statuses are transport errors.
//! - Bodies larger than `max_response_bytes` fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use datamart_core::CostReport;
use datamart_core::EventPage;
use datamart_core::GatewayError;
use datamart_core::InstallCount;
use datamart_core::OrderLine;
use datamart_core::RawDataGateway;
use datamart_core::ReportDate;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde::Deserialize;

use crate::decode::decode_costs;
use crate::decode::decode_events_page;
use crate::decode::decode_installs;
use crate::decode::decode_orders;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP gateway.
///
/// # Invariants
/// - `base_url` is an absolute `https://` URL (`http://` only with `allow_http`)
///   without embedded credentials.
/// - `max_response_bytes` is a hard upper bound on every response body.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpGatewayConfig {
    /// Base URL of the partner API; endpoint names are appended as path segments.
    pub base_url: String,
    /// Headers attached to every request (API keys, bearer tokens).
    pub auth_headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Optional breakdown requested from the costs endpoint.
    pub cost_dimension: Option<String>,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_headers: BTreeMap::new(),
            timeout_ms: 30_000,
            max_response_bytes: 64 * 1024 * 1024,
            allow_http: false,
            user_agent: "datamart/0.1".to_string(),
            cost_dimension: None,
        }
    }
}

impl HttpGatewayConfig {
    /// Validates the configuration without building a client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        self.base_url()?;
        if self.timeout_ms == 0 {
            return Err(config_error("timeout_ms must be greater than zero"));
        }
        if self.max_response_bytes == 0 {
            return Err(config_error("max_response_bytes must be greater than zero"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(config_error("user_agent must be non-empty"));
        }
        if self.cost_dimension.as_deref().is_some_and(|dimension| dimension.trim().is_empty()) {
            return Err(config_error("cost_dimension must be non-empty when set"));
        }
        self.header_map()?;
        Ok(())
    }

    /// Parses and checks `base_url`.
    fn base_url(&self) -> Result<Url, GatewayError> {
        if self.base_url.trim().is_empty() {
            return Err(config_error("base_url is required"));
        }
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| config_error(format!("base_url is invalid: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => return Err(config_error("base_url uses http but allow_http is false")),
            other => return Err(config_error(format!("base_url scheme {other} is not supported"))),
        }
        if url.host_str().is_none() {
            return Err(config_error("base_url must include a host"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(config_error("base_url must not embed credentials"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(config_error("base_url must not carry a query or fragment"));
        }
        Ok(url)
    }

    /// Builds the default header map from `auth_headers`.
    fn header_map(&self) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.auth_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| config_error(format!("auth header name {name} is invalid")))?;
            let mut header_value = HeaderValue::from_str(value)
                .map_err(|_| config_error(format!("auth header {name} has an invalid value")))?;
            header_value.set_sensitive(true);
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

/// Builds a configuration error.
fn config_error(message: impl Into<String>) -> GatewayError {
    GatewayError::Config(message.into())
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Raw data gateway backed by the partner HTTP API.
///
/// # Invariants
/// - Every request carries `date=YYYY-MM-DD`.
/// - Redirects are not followed.
pub struct HttpGateway {
    /// Gateway configuration, including limits.
    config: HttpGatewayConfig,
    /// Parsed base URL.
    base_url: Url,
    /// HTTP client with auth headers preinstalled.
    client: Client,
}

impl HttpGateway {
    /// Creates a gateway from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the configuration is invalid or
    /// the HTTP client cannot be created.
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let base_url = config.base_url()?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(config.header_map()?)
            .redirect(Policy::none())
            .build()
            .map_err(|_| config_error("http client build failed"))?;
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    /// Builds the URL for `endpoint` with `query` parameters.
    fn endpoint_url(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| config_error("base_url cannot carry path segments"))?
            .pop_if_empty()
            .push(endpoint);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Issues a GET request and returns the size-limited body.
    fn fetch(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, GatewayError> {
        let url = self.endpoint_url(endpoint, query)?;
        let mut response = self.client.get(url).send().map_err(|err| {
            let kind = if err.is_timeout() { "timed out" } else { "failed" };
            GatewayError::Transport(format!("GET /{endpoint} {kind}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "GET /{endpoint} returned status {}",
                status.as_u16()
            )));
        }
        read_response_limited(&mut response, self.config.max_response_bytes)
            .map_err(|message| GatewayError::Transport(format!("GET /{endpoint}: {message}")))
    }
}

impl RawDataGateway for HttpGateway {
    fn get_costs(&self, date: ReportDate) -> Result<CostReport, GatewayError> {
        let date = date.to_string();
        let mut query = vec![("date", date.as_str())];
        if let Some(dimension) = self.config.cost_dimension.as_deref() {
            query.push(("dimensions", dimension));
        }
        decode_costs(&self.fetch("costs", &query)?)
    }

    fn get_installs(&self, date: ReportDate) -> Result<InstallCount, GatewayError> {
        let date = date.to_string();
        decode_installs(&self.fetch("installs", &[("date", date.as_str())])?)
    }

    fn get_orders(&self, date: ReportDate) -> Result<Vec<OrderLine>, GatewayError> {
        let date = date.to_string();
        decode_orders(Bytes::from(self.fetch("orders", &[("date", date.as_str())])?))
    }

    fn get_events_page(
        &self,
        date: ReportDate,
        cursor: Option<&str>,
    ) -> Result<EventPage, GatewayError> {
        let date = date.to_string();
        let mut query = vec![("date", date.as_str())];
        if let Some(cursor) = cursor {
            query.push(("next_page", cursor));
        }
        decode_events_page(&self.fetch("events", &query)?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, String> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| "response size limit exceeds u64".to_string())?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(format!("response exceeds size limit of {max_bytes} bytes"));
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle.read_to_end(&mut buf).map_err(|_| "failed to read response".to_string())?;
    if buf.len() > max_bytes {
        return Err(format!("response exceeds size limit of {max_bytes} bytes"));
    }
    if let Some(expected) = expected_len {
        let expected =
            usize::try_from(expected).map_err(|_| "invalid response length".to_string())?;
        if buf.len() < expected {
            return Err("response truncated".to_string());
        }
    }
    Ok(buf)
}
