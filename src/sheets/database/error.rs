// src/sheets/database/error.rs

use std::path::PathBuf;
use thiserror::Error;

use super::Revision;
use crate::sheets::cell_value::CellValueError;
use crate::sheets::validation::ValidationError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("Invalid cell value: {0}")]
    Value(#[from] CellValueError),
    #[error("Stored rows are inconsistent: {0}")]
    Snapshot(#[from] ValidationError),
    #[error("Stored data changed since it was loaded (loaded revision {expected}, stored revision {found}); refresh before saving")]
    RevisionConflict { expected: Revision, found: Revision },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
