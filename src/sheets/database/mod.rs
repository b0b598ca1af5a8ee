// src/sheets/database/mod.rs

pub mod connection;
pub mod error;
pub mod helpers;
pub mod reader;
pub mod schema;
pub mod sheet_file;
pub mod sqlite_store;
pub mod writer;

pub use connection::DbConnection;
pub use error::{StorageError, StorageResult};
pub use reader::DbReader;
pub use sheet_file::SheetFileStore;
pub use sqlite_store::SqliteStore;
pub use writer::DbWriter;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::table_snapshot::{KeySource, TableSnapshot, DEFAULT_SHEET_NAME};

pub const DEFAULT_TABLE_NAME: &str = "tp_import";

/// Monotonic stamp bumped by every successful persist of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub const INITIAL: Revision = Revision(0);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A loaded snapshot together with the revision it was read at.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub snapshot: TableSnapshot,
    pub revision: Revision,
}

/// Persistent home of the baseline table.
pub trait SnapshotStore {
    fn load(&self) -> StorageResult<StoredSnapshot>;

    /// Replaces the stored table with `snapshot`. When `expected` is given
    /// and the stored revision differs, nothing is written and
    /// [`StorageError::RevisionConflict`] is returned.
    fn persist(&mut self, snapshot: &TableSnapshot, expected: Option<Revision>) -> StorageResult<Revision>;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Sqlite,
    File,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Sqlite => f.write_str("sqlite"),
            StoreKind::File => f.write_str("file"),
        }
    }
}

/// Which table to use inside a store and how its rows are keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreLayout {
    pub sheet_name: String,
    pub table_name: String,
    pub key: KeySource,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            key: KeySource::Position,
        }
    }
}

pub fn open_store(kind: StoreKind, path: &Path, layout: StoreLayout) -> StorageResult<Box<dyn SnapshotStore>> {
    let store: Box<dyn SnapshotStore> = match kind {
        StoreKind::Sqlite => Box::new(SqliteStore::open(path, layout)?),
        StoreKind::File => Box::new(SheetFileStore::new(path, layout)),
    };
    Ok(store)
}

/// Shared revision gate for store implementations.
pub(crate) fn check_revision(expected: Option<Revision>, found: Revision) -> StorageResult<()> {
    match expected {
        Some(expected) if expected != found => Err(StorageError::RevisionConflict { expected, found }),
        _ => Ok(()),
    }
}
