// crates/datamart-core/src/memory.rs
// ============================================================================
// Module: In-Memory Datamart Store
// Description: Process-local DatamartStore implementation.
// Purpose: Back dry runs and tests without object storage.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`InMemoryDatamartStore`] keeps the serialized datamart in a mutex-guarded
//! buffer and counts saves so callers can assert that failed runs never
//! persist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use crate::interfaces::DatamartStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory datamart store.
#[derive(Debug, Default)]
pub struct InMemoryDatamartStore {
    /// Stored bytes and number of saves.
    inner: Mutex<(Option<Vec<u8>>, usize)>,
}

impl InMemoryDatamartStore {
    /// Creates a store with nothing persisted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `bytes`.
    #[must_use]
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Mutex::new((Some(bytes.into()), 0)),
        }
    }

    /// Returns the currently persisted bytes.
    #[must_use]
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.inner.lock().ok().and_then(|guard| guard.0.clone())
    }

    /// Returns how many times [`DatamartStore::save`] succeeded.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|guard| guard.1).unwrap_or_default()
    }
}

impl DatamartStore for InMemoryDatamartStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let guard =
            self.inner.lock().map_err(|_| StoreError::Io("store mutex poisoned".to_string()))?;
        Ok(guard.0.clone())
    }

    fn save(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut guard =
            self.inner.lock().map_err(|_| StoreError::Io("store mutex poisoned".to_string()))?;
        guard.0 = Some(bytes);
        guard.1 += 1;
        drop(guard);
        Ok(())
    }

    fn location(&self) -> String {
        "memory://datamart".to_string()
    }
}
