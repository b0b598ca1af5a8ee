// src/sheets/validation.rs
// Structural checks on snapshots before they are compared or stored

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("column sets differ (missing from edited: [{}], unexpected in edited: [{}])", missing.join(", "), unexpected.join(", "))]
    ColumnMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("duplicate row key '{key}' at rows {first} and {second}")]
    DuplicateRowKey {
        key: String,
        first: usize,
        second: usize,
    },
    #[error("row {row} has no value in key column '{column}'")]
    MissingRowKey { row: usize, column: String },
    #[error("row {row} has {found} cells but the sheet has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown row '{0}'")]
    UnknownRow(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("{rows} rows but {keys} row indices")]
    RowIndexCount { rows: usize, keys: usize },
}
