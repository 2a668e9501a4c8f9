// crates/datamart-store/src/object_store.rs
// ============================================================================
// Module: Datamart Object Storage
// Description: S3-compatible object-store backend for the datamart CSV.
// Purpose: Persist the datamart as a single object with strict key validation.
// Dependencies: datamart-core, datamart-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! [`ObjectStoreDatamartStore`] keeps the datamart as one object addressed by
//! `bucket` plus an optional prefix and key. The AWS SDK is async; calls are
//! bridged onto a private Tokio runtime so the batch pipeline stays blocking.
//!
//! Invariants:
//! - A missing object loads as `Ok(None)`; every other backend failure is an
//!   error.
//! - Reads are bounded by a size limit, checked against `Content-Length` and
//!   again while streaming.
//! - Keys are `/`-separated relative paths with no empty, `.`, or `..`
//!   segments and no backslashes; the prefixed key stays within
//!   [`MAX_OBJECT_KEY_LENGTH`] bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use datamart_config::ObjectStoreConfig;
use datamart_config::ObjectStoreProvider;
use datamart_core::DatamartStore;
use datamart_core::StoreError;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default upper bound on the datamart object size (64 MiB).
pub const DEFAULT_MAX_DATAMART_BYTES: usize = 64 * 1024 * 1024;
/// Maximum length of the full object key, prefix included (S3 limit).
pub const MAX_OBJECT_KEY_LENGTH: usize = 1024;
/// Content type recorded on saved datamart objects.
const DATAMART_CONTENT_TYPE: &str = "text/csv";

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Runs `future` to completion on the store's runtime.
///
/// When the caller is already inside a Tokio runtime, the future is driven
/// from a scoped helper thread so the caller's runtime is never blocked on.
fn block_on<F>(runtime: &Runtime, future: F) -> Result<F::Output, ObjectStoreError>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return Ok(runtime.block_on(future));
    }
    std::thread::scope(|scope| {
        scope
            .spawn(|| runtime.block_on(future))
            .join()
            .map_err(|_| ObjectStoreError::Io("object store worker panicked".to_string()))
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Object-store errors for datamart storage.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// Invalid configuration or key input.
    #[error("object store invalid: {0}")]
    Invalid(String),
    /// Backend I/O failure.
    #[error("object store io error: {0}")]
    Io(String),
    /// Backend returned an error.
    #[error("object store backend error: {0}")]
    Backend(String),
    /// Object exceeds size limits.
    #[error("object too large: {path} ({actual_bytes} > {max_bytes})")]
    TooLarge {
        /// Object key.
        path: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
}

impl From<ObjectStoreError> for StoreError {
    fn from(error: ObjectStoreError) -> Self {
        match error {
            ObjectStoreError::Invalid(message) => Self::Invalid(message),
            ObjectStoreError::TooLarge {
                max_bytes,
                actual_bytes,
                ..
            } => Self::TooLarge {
                max_bytes,
                actual_bytes,
            },
            error @ (ObjectStoreError::Io(_) | ObjectStoreError::Backend(_)) => {
                Self::Io(error.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Object Store Client
// ============================================================================

/// Minimal object-store client abstraction.
pub trait ObjectStoreClient: Send + Sync {
    /// Writes a single object to storage, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the write fails.
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ObjectStoreError>;

    /// Reads a single object with a size limit; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the read fails or exceeds `max_bytes`.
    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, ObjectStoreError>;
}

/// S3-backed object-store client.
struct S3ObjectStoreClient {
    /// Underlying S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Runtime driving SDK calls; taken on drop.
    runtime: Option<Runtime>,
}

impl Drop for S3ObjectStoreClient {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; background shutdown does not.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl S3ObjectStoreClient {
    /// Builds a new S3-backed object store client.
    fn new(config: &ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        let runtime = Runtime::new().map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let sdk_config = block_on(&runtime, async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        })?;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            runtime: Some(runtime),
        })
    }

    /// Returns the runtime; absent only while dropping.
    fn runtime(&self) -> Result<&Runtime, ObjectStoreError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| ObjectStoreError::Io("object store runtime closed".to_string()))
    }
}

impl ObjectStoreClient for S3ObjectStoreClient {
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ObjectStoreError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(bytes));
        block_on(self.runtime()?, request.send())?
            .map(|_| ())
            .map_err(|err| ObjectStoreError::Backend(err.to_string()))
    }

    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let request = self.client.get_object().bucket(&self.bucket).key(key);
        block_on(self.runtime()?, async move {
            let output = match request.send().await {
                Ok(output) => output,
                Err(err) if err.as_service_error().is_some_and(|err| err.is_no_such_key()) => {
                    return Ok(None);
                }
                Err(err) => return Err(ObjectStoreError::Backend(err.to_string())),
            };
            let too_large = |actual_bytes: usize| ObjectStoreError::TooLarge {
                path: key.to_string(),
                max_bytes,
                actual_bytes,
            };
            let declared = output.content_length().map_or(0, |length| {
                usize::try_from(length).unwrap_or(usize::MAX)
            });
            if declared > max_bytes {
                return Err(too_large(declared));
            }
            // One byte past the limit is enough to tell an oversized body apart.
            let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
            let mut buffer = Vec::with_capacity(declared);
            output
                .body
                .into_async_read()
                .take(limit)
                .read_to_end(&mut buffer)
                .await
                .map_err(|err| ObjectStoreError::Io(err.to_string()))?;
            if buffer.len() > max_bytes {
                return Err(too_large(buffer.len()));
            }
            Ok(Some(buffer))
        })?
    }
}

// ============================================================================
// SECTION: Datamart Store
// ============================================================================

/// Object-store-backed datamart.
pub struct ObjectStoreDatamartStore {
    /// Object-store client implementation.
    client: Arc<dyn ObjectStoreClient>,
    /// Storage URI scheme (e.g., s3).
    scheme: &'static str,
    /// Bucket name used for storage.
    bucket: String,
    /// Full object key, prefix included.
    key: String,
    /// Maximum accepted object size on load.
    max_bytes: usize,
}

impl ObjectStoreDatamartStore {
    /// Creates a store from object-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when configuration or initialization fails.
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        config.validate().map_err(|err| ObjectStoreError::Invalid(err.to_string()))?;
        let key = object_key(config.prefix.as_deref().unwrap_or(""), &config.key)?;
        let (client, scheme) = match config.provider {
            ObjectStoreProvider::S3 => {
                (Arc::new(S3ObjectStoreClient::new(config)?) as Arc<dyn ObjectStoreClient>, "s3")
            }
        };
        Ok(Self {
            client,
            scheme,
            bucket: config.bucket.clone(),
            key,
            max_bytes: DEFAULT_MAX_DATAMART_BYTES,
        })
    }

    /// Creates a store over a caller-supplied client.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the prefix or key is invalid.
    pub fn from_client(
        client: Arc<dyn ObjectStoreClient>,
        bucket: &str,
        prefix: &str,
        key: &str,
    ) -> Result<Self, ObjectStoreError> {
        if bucket.trim().is_empty() {
            return Err(ObjectStoreError::Invalid("bucket must be set".to_string()));
        }
        Ok(Self {
            client,
            scheme: "memory",
            bucket: bucket.to_string(),
            key: object_key(prefix, key)?,
            max_bytes: DEFAULT_MAX_DATAMART_BYTES,
        })
    }

    /// Overrides the maximum accepted object size.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Returns the full object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl DatamartStore for ObjectStoreDatamartStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.client.get(&self.key, self.max_bytes)?)
    }

    fn save(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        if bytes.len() > self.max_bytes {
            return Err(StoreError::TooLarge {
                max_bytes: self.max_bytes,
                actual_bytes: bytes.len(),
            });
        }
        Ok(self.client.put(&self.key, bytes, Some(DATAMART_CONTENT_TYPE))?)
    }

    fn location(&self) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

// ============================================================================
// SECTION: Key Helpers
// ============================================================================

/// Builds the full object key from an optional prefix and the datamart key.
///
/// Surrounding whitespace and one trailing `/` on the prefix are ignored.
fn object_key(prefix: &str, key: &str) -> Result<String, ObjectStoreError> {
    let prefix = prefix.trim();
    let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    check_key_path("key", key)?;
    let full = if prefix.is_empty() {
        key.to_string()
    } else {
        check_key_path("prefix", prefix)?;
        format!("{prefix}/{key}")
    };
    if full.len() > MAX_OBJECT_KEY_LENGTH {
        return Err(ObjectStoreError::Invalid(format!(
            "object key exceeds {MAX_OBJECT_KEY_LENGTH} bytes"
        )));
    }
    Ok(full)
}

/// Checks that `path` is a relative `/`-separated key with plain segments.
fn check_key_path(field: &str, path: &str) -> Result<(), ObjectStoreError> {
    if path.contains('\\') {
        return Err(ObjectStoreError::Invalid(format!("{field} must not contain backslashes")));
    }
    if path.starts_with('/') {
        return Err(ObjectStoreError::Invalid(format!("{field} must be relative")));
    }
    if path.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
        return Err(ObjectStoreError::Invalid(format!(
            "{field} must not contain empty, '.', or '..' segments"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
