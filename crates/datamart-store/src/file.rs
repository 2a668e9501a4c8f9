// crates/datamart-store/src/file.rs
// ============================================================================
// Module: Datamart File Storage
// Description: Local file backend for the datamart CSV.
// Purpose: Persist the datamart on disk with write-then-rename replacement.
// Dependencies: datamart-core
// ============================================================================

//! ## Overview
//! [`FileDatamartStore`] reads and writes a single CSV file. Saves go through
//! a sibling temporary file that is synced and renamed over the target, so a
//! failed write never leaves a truncated datamart behind.

use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use datamart_core::DatamartStore;
use datamart_core::StoreError;

/// Local file datamart.
#[derive(Debug, Clone)]
pub struct FileDatamartStore {
    /// Path of the datamart CSV.
    path: PathBuf,
}

impl FileDatamartStore {
    /// Creates a store for the given file path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the datamart file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary path used while saving.
    fn temp_path(&self) -> Result<PathBuf, StoreError> {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::Invalid("datamart path has no file name".to_string()))?;
        Ok(self.path.with_file_name(format!(".{file_name}.tmp.{}", std::process::id())))
    }
}

impl DatamartStore for FileDatamartStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(format!("{}: {err}", self.path.display()))),
        }
    }

    fn save(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        let io_error = |err: std::io::Error| StoreError::Io(format!("{}: {err}", self.path.display()));
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let temp_path = self.temp_path()?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(io_error)?;
        let written = file.write_all(&bytes).and_then(|()| file.sync_all());
        drop(file);
        if let Err(err) = written.and_then(|()| fs::rename(&temp_path, &self.path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(err));
        }
        Ok(())
    }

    fn location(&self) -> String {
        format!("file://{}", self.path.display())
    }
}
