// crates/datamart-store/src/lib.rs
// ============================================================================
// Module: Datamart Store Library
// Description: Persistence backends for the datamart CSV.
// Purpose: Select and build a [`DatamartStore`] from storage configuration.
// Dependencies: datamart-core, datamart-config, aws-sdk-s3
// ============================================================================

//! ## Overview
//! Two backends implement [`DatamartStore`]: an S3-compatible object store
//! for production and a local file for development and tests. Both report a
//! missing datamart as `Ok(None)` and replace the whole object on save.

pub mod file;
pub mod object_store;

use datamart_config::StorageConfig;
use datamart_core::DatamartStore;
use datamart_core::StoreError;
pub use file::FileDatamartStore;
pub use object_store::DEFAULT_MAX_DATAMART_BYTES;
pub use object_store::ObjectStoreClient;
pub use object_store::ObjectStoreDatamartStore;
pub use object_store::ObjectStoreError;

/// Builds the configured datamart store.
///
/// # Errors
///
/// Returns [`StoreError`] when the backend cannot be initialized.
pub fn build_store(config: &StorageConfig) -> Result<Box<dyn DatamartStore>, StoreError> {
    match config {
        StorageConfig::ObjectStore(object) => {
            let store = ObjectStoreDatamartStore::new(object).map_err(StoreError::from)?;
            Ok(Box::new(store))
        }
        StorageConfig::File(file) => Ok(Box::new(FileDatamartStore::new(&file.path))),
    }
}
