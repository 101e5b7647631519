//! CSV table helpers
//!
//! Configuration tables carry a header row; columns are matched by name so
//! their order is free. Cells are trimmed and `#` starts a comment line.

use crate::error::{ParseError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::path::Path;

/// One deserialized table row with its source line
#[derive(Debug, Clone)]
pub struct TableRow<T> {
    pub line: u64,
    pub record: T,
}

/// CSV table reader
pub struct CsvTable;

impl CsvTable {
    /// Read a table file into a string
    pub fn read_file(path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Header row of a table
    pub fn headers(input: &str) -> Result<StringRecord> {
        let mut reader = Self::reader(input);
        Ok(reader.headers()?.clone())
    }

    /// Deserialize every row, checking required columns first
    pub fn rows<T: DeserializeOwned>(
        input: &str,
        table: &str,
        required: &[&str],
    ) -> Result<Vec<TableRow<T>>> {
        let mut reader = Self::reader(input);
        let headers = reader.headers()?.clone();
        Self::validate_required_columns(&headers, table, required)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let parsed: T = record.deserialize(Some(&headers))?;
            rows.push(TableRow {
                line,
                record: parsed,
            });
        }

        log::debug!("Read {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Validate that all required columns are present
    pub fn validate_required_columns(
        headers: &StringRecord,
        table: &str,
        required: &[&str],
    ) -> Result<()> {
        for column in required {
            if !headers.iter().any(|h| h == *column) {
                return Err(ParseError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        ReaderBuilder::new()
            .trim(Trim::All)
            .comment(Some(b'#'))
            .from_reader(input.as_bytes())
    }
}

/// Optional cell: `None` when absent or blank
pub(crate) fn non_empty(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Boolean cell: blank is false
pub(crate) fn parse_flag(field: &str, cell: &Option<String>) -> Result<bool> {
    match non_empty(cell).map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(ParseError::InvalidValue {
            field: field.to_string(),
            message: format!("expected true or false, got '{}'", other),
        }),
    }
}
