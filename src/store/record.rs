//! Typed records and batch validation

use std::collections::HashSet;

use super::schema::TableSchema;
use super::value::{validate_cells, Row, Value};
use crate::error::ValidationError;

/// A persisted entity with a fixed table schema
pub trait Record: Sized {
    fn schema() -> &'static TableSchema;

    /// Cells in schema column order
    fn to_row(&self) -> Vec<Value>;

    fn from_row(row: Row) -> Result<Self, ValidationError>;

    /// Record-level constraints beyond cell types
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Render the key cells of a row for duplicate detection and messages
pub fn key_string(schema: &TableSchema, cells: &[Value]) -> String {
    schema
        .key_indices()
        .into_iter()
        .map(|i| cells[i].to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Validate a candidate batch and return its rows ready for persistence.
///
/// Runs the record checks, then the cell checks, then key uniqueness
/// within the batch. The first failure is returned with its row index.
pub fn validate_batch<R: Record>(records: &[R]) -> Result<Vec<Vec<Value>>, ValidationError> {
    let schema = R::schema();
    let mut seen = HashSet::with_capacity(records.len());
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        record.check().map_err(|e| e.at_row(index))?;

        let cells = record.to_row();
        validate_cells(schema, &cells).map_err(|e| e.at_row(index))?;

        let key = key_string(schema, &cells);
        if !seen.insert(key.clone()) {
            return Err(ValidationError::new(
                schema.name,
                schema.key.join(", "),
                format!("duplicate key {}", key),
            )
            .at_row(index));
        }
        rows.push(cells);
    }

    Ok(rows)
}

/// Common field checks shared by the record types
pub(crate) mod checks {
    use crate::error::ValidationError;

    pub fn is_hex_hash(value: &str) -> bool {
        matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn hash(table: &str, field: &str, value: &str) -> Result<(), ValidationError> {
        if is_hex_hash(value) {
            Ok(())
        } else {
            Err(ValidationError::new(table, field, format!("'{}' is not a hex commit hash", value)))
        }
    }

    pub fn non_empty(table: &str, field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            Err(ValidationError::new(table, field, "must not be empty"))
        } else {
            Ok(())
        }
    }

    pub fn non_negative(table: &str, field: &str, value: i64) -> Result<(), ValidationError> {
        if value < 0 {
            Err(ValidationError::new(table, field, format!("must not be negative, found {}", value)))
        } else {
            Ok(())
        }
    }
}
