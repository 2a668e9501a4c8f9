// crates/datamart-core/src/table.rs
// ============================================================================
// Module: Datamart Table
// Description: Ordered, date-keyed table of daily KPI rows.
// Purpose: Load, upsert, and serialize the persisted datamart.
// Dependencies: csv, thiserror
// ============================================================================

//! ## Overview
//! [`DatamartTable`] is the in-memory form of the persisted datamart file.
//! Invariants:
//! - At most one row per [`ReportDate`]; [`DatamartTable::upsert`] replaces in
//!   place and appends otherwise, so re-running a date never duplicates rows.
//! - Serialized form is UTF-8 CSV with header `date,cpi,revenue,roas` and no
//!   index column; `serialize(load(serialize(t))) == serialize(t)`.
//! - An absent or empty persisted form is a valid, empty table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use csv::ReaderBuilder;
use csv::Terminator;
use csv::Trim;
use csv::WriterBuilder;
use thiserror::Error;

use crate::model::DatamartRow;
use crate::model::ReportDate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Persisted column order.
pub const DATAMART_COLUMNS: [&str; 4] = ["date", "cpi", "revenue", "roas"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while reading or writing the datamart table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Persisted form is missing a required column.
    #[error("datamart is missing column: {0}")]
    MissingColumn(&'static str),
    /// Persisted form could not be parsed.
    #[error("datamart parse error: {0}")]
    Parse(String),
    /// Table could not be encoded.
    #[error("datamart serialize error: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Table
// ============================================================================

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpsertOutcome {
    /// No row existed for the date; the row was appended.
    Inserted,
    /// A row existed for the date and was replaced in place.
    Replaced {
        /// Row that was overwritten.
        previous: DatamartRow,
    },
}

/// Ordered datamart table, unique on date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatamartTable {
    /// Rows in persisted order.
    rows: Vec<DatamartRow>,
    /// Rows dropped while loading because their date repeated.
    collapsed_duplicates: usize,
}

impl DatamartTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the persisted form.
    ///
    /// `None`, empty, whitespace-only, and header-only inputs yield an empty
    /// table. Repeated dates collapse onto the first occurrence's position with
    /// the last occurrence's values.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the input is not UTF-8 CSV with the datamart
    /// columns, or when a row fails to parse.
    pub fn load(serialized: Option<&[u8]>) -> Result<Self, TableError> {
        let Some(bytes) = serialized else {
            return Ok(Self::new());
        };
        let text = std::str::from_utf8(bytes)
            .map_err(|_| TableError::Parse("datamart must be utf-8".to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let mut reader =
            ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(text.as_bytes());
        let headers = reader.headers().map_err(|err| TableError::Parse(err.to_string()))?.clone();
        for column in DATAMART_COLUMNS {
            if !headers.iter().any(|header| header == column) {
                return Err(TableError::MissingColumn(column));
            }
        }
        let mut table = Self::new();
        for (index, record) in reader.deserialize::<DatamartRow>().enumerate() {
            let row = record
                .map_err(|err| TableError::Parse(format!("data row {}: {err}", index + 1)))?;
            if let UpsertOutcome::Replaced {
                ..
            } = table.upsert(row)
            {
                table.collapsed_duplicates += 1;
            }
        }
        Ok(table)
    }

    /// Inserts `row`, replacing any existing row with the same date.
    pub fn upsert(&mut self, row: DatamartRow) -> UpsertOutcome {
        match self.rows.iter_mut().find(|existing| existing.date == row.date) {
            Some(existing) => {
                let previous = std::mem::replace(existing, row);
                UpsertOutcome::Replaced {
                    previous,
                }
            }
            None => {
                self.rows.push(row);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Encodes the table as CSV with a fixed header.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Serialize`] when encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(DATAMART_COLUMNS).map_err(|err| TableError::Serialize(err.to_string()))?;
        for row in &self.rows {
            writer.serialize(row).map_err(|err| TableError::Serialize(err.to_string()))?;
        }
        writer.into_inner().map_err(|err| TableError::Serialize(err.to_string()))
    }

    /// Returns the row for `date`, if present.
    #[must_use]
    pub fn get(&self, date: ReportDate) -> Option<&DatamartRow> {
        self.rows.iter().find(|row| row.date == date)
    }

    /// Returns rows in persisted order.
    #[must_use]
    pub fn rows(&self) -> &[DatamartRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns how many repeated-date rows were collapsed during [`Self::load`].
    #[must_use]
    pub const fn collapsed_duplicates(&self) -> usize {
        self.collapsed_duplicates
    }
}
