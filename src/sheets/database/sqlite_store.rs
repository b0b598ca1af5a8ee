// src/sheets/database/sqlite_store.rs

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

use super::connection::DbConnection;
use super::error::StorageResult;
use super::reader::DbReader;
use super::schema::read_revision;
use super::writer::DbWriter;
use super::{check_revision, Revision, SnapshotStore, StoreLayout, StoredSnapshot};
use crate::sheets::table_snapshot::TableSnapshot;

/// Baseline table kept in a SQLite database.
pub struct SqliteStore {
    conn: Connection,
    location: Option<PathBuf>,
    layout: StoreLayout,
}

impl SqliteStore {
    pub fn open(path: &Path, layout: StoreLayout) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| super::StorageError::io(parent, e))?;
        }
        Ok(Self {
            conn: DbConnection::open(path)?,
            location: Some(path.to_path_buf()),
            layout,
        })
    }

    pub fn in_memory(layout: StoreLayout) -> StorageResult<Self> {
        Ok(Self {
            conn: DbConnection::open_in_memory()?,
            location: None,
            layout,
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self) -> StorageResult<StoredSnapshot> {
        let snapshot = DbReader::read_sheet(
            &self.conn,
            &self.layout.table_name,
            &self.layout.sheet_name,
            &self.layout.key,
        )?;
        let revision = read_revision(&self.conn, &self.layout.table_name)?;
        Ok(StoredSnapshot { snapshot, revision })
    }

    fn persist(&mut self, snapshot: &TableSnapshot, expected: Option<Revision>) -> StorageResult<Revision> {
        let tx = self.conn.transaction()?;
        let current = read_revision(&tx, &self.layout.table_name)?;
        check_revision(expected, current)?;

        let next = current.next();
        DbWriter::replace_sheet(&tx, &self.layout.table_name, snapshot, next)?;
        tx.commit()?;

        info!(
            "Persisted {} rows to '{}' in {} (revision {})",
            snapshot.len(),
            self.layout.table_name,
            self.describe(),
            next
        );
        Ok(next)
    }

    fn describe(&self) -> String {
        match &self.location {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}
