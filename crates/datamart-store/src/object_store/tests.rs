// crates/datamart-store/src/object_store/tests.rs
// ============================================================================
// Module: Datamart Object Store Tests
// Description: Unit tests for the object-store datamart backend.
// Purpose: Validate key normalization, size limits, and missing-object handling.
// ============================================================================

//! ## Overview
//! Exercises the datamart object store over an in-memory client and a client
//! that always fails, plus the object key rules.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::*;

// ============================================================================
// SECTION: In-Memory Client
// ============================================================================

/// Object store kept in a map keyed by object key.
#[derive(Default)]
struct InMemoryObjectStore {
    /// Stored bytes and content type per key.
    objects: Mutex<BTreeMap<String, (Vec<u8>, Option<String>)>>,
}

impl InMemoryObjectStore {
    /// Returns a stored object with its content type.
    fn object(&self, key: &str) -> Option<(Vec<u8>, Option<String>)> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

impl ObjectStoreClient for InMemoryObjectStore {
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object store lock poisoned".to_string()))?
            .insert(key.to_string(), (bytes, content_type.map(str::to_string)));
        Ok(())
    }

    fn get(&self, key: &str, max_bytes: usize) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let Some((bytes, _)) = self.object(key) else {
            return Ok(None);
        };
        if bytes.len() > max_bytes {
            return Err(ObjectStoreError::TooLarge {
                path: key.to_string(),
                max_bytes,
                actual_bytes: bytes.len(),
            });
        }
        Ok(Some(bytes))
    }
}

/// Object store that rejects every call.
struct FailingObjectStore;

impl ObjectStoreClient for FailingObjectStore {
    fn put(&self, _: &str, _: Vec<u8>, _: Option<&str>) -> Result<(), ObjectStoreError> {
        Err(ObjectStoreError::Backend("access denied".to_string()))
    }

    fn get(&self, _: &str, _: usize) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        Err(ObjectStoreError::Backend("access denied".to_string()))
    }
}

/// Builds a datamart store over `client` under the `prod/` prefix.
fn memory_store(client: &Arc<InMemoryObjectStore>) -> ObjectStoreDatamartStore {
    ObjectStoreDatamartStore::from_client(
        Arc::clone(client) as Arc<dyn ObjectStoreClient>,
        "marts",
        "prod/",
        "DataMart_data/DataMart.csv",
    )
    .unwrap()
}

// ============================================================================
// SECTION: Store Behavior
// ============================================================================

#[test]
fn missing_object_loads_as_none() {
    let client = Arc::new(InMemoryObjectStore::default());
    let store = memory_store(&client);
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn save_then_load_uses_prefixed_key_and_csv_content_type() {
    let client = Arc::new(InMemoryObjectStore::default());
    let store = memory_store(&client);

    store.save(b"date,cpi,revenue,roas\n".to_vec()).unwrap();

    let (bytes, content_type) = client.object("prod/DataMart_data/DataMart.csv").unwrap();
    assert_eq!(bytes, b"date,cpi,revenue,roas\n");
    assert_eq!(content_type.as_deref(), Some("text/csv"));
    assert_eq!(store.load().unwrap(), Some(bytes));
    assert_eq!(store.location(), "memory://marts/prod/DataMart_data/DataMart.csv");
}

#[test]
fn save_replaces_previous_object() {
    let client = Arc::new(InMemoryObjectStore::default());
    let store = memory_store(&client);
    store.save(b"first".to_vec()).unwrap();
    store.save(b"second".to_vec()).unwrap();
    assert_eq!(store.load().unwrap(), Some(b"second".to_vec()));
}

#[test]
fn oversized_object_fails_closed() {
    let client = Arc::new(InMemoryObjectStore::default());
    let store = memory_store(&client).with_max_bytes(4);
    client.put(store.key(), b"0123456789".to_vec(), None).unwrap();

    let err = store.load().unwrap_err();

    assert_eq!(
        err,
        StoreError::TooLarge {
            max_bytes: 4,
            actual_bytes: 10,
        }
    );
    assert!(matches!(store.save(vec![0; 5]), Err(StoreError::TooLarge { .. })));
}

#[test]
fn backend_failures_surface_as_io_errors() {
    let store = ObjectStoreDatamartStore::from_client(
        Arc::new(FailingObjectStore),
        "marts",
        "",
        "DataMart.csv",
    )
    .unwrap();
    assert!(matches!(store.load(), Err(StoreError::Io(message)) if message.contains("access denied")));
    assert!(matches!(store.save(Vec::new()), Err(StoreError::Io(_))));
}

// ============================================================================
// SECTION: Key Helpers
// ============================================================================

#[test]
fn object_key_joins_prefix_with_single_slash() {
    assert_eq!(object_key("", "DataMart.csv").unwrap(), "DataMart.csv");
    assert_eq!(object_key(" prod ", "DataMart.csv").unwrap(), "prod/DataMart.csv");
    assert_eq!(object_key("prod/daily/", "d/DataMart.csv").unwrap(), "prod/daily/d/DataMart.csv");
}

#[test]
fn object_key_rejects_absolute_and_traversal_prefixes() {
    for prefix in ["/prod", "prod/../other", "prod//daily", "./prod"] {
        assert!(object_key(prefix, "DataMart.csv").is_err(), "prefix {prefix:?} should be rejected");
    }
}

#[test]
fn object_keys_reject_unsafe_paths() {
    for key in ["", "../DataMart.csv", "/DataMart.csv", "a\\b.csv", "./DataMart.csv", "a//b.csv"] {
        assert!(object_key("", key).is_err(), "key {key:?} should be rejected");
    }
}

#[test]
fn object_key_length_includes_prefix() {
    let key = "a".repeat(MAX_OBJECT_KEY_LENGTH - 5);
    assert_eq!(object_key("", &key).unwrap().len(), MAX_OBJECT_KEY_LENGTH - 5);
    assert!(object_key("prod", &key).is_ok());
    assert!(object_key("daily", &key).is_err());
}

#[test]
fn from_client_requires_bucket() {
    let client: Arc<dyn ObjectStoreClient> = Arc::new(InMemoryObjectStore::default());
    assert!(ObjectStoreDatamartStore::from_client(client, " ", "", "DataMart.csv").is_err());
}
