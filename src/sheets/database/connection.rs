// src/sheets/database/connection.rs

use super::error::StorageResult;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub struct DbConnection;

impl DbConnection {
    /// Opens (or creates) a database file and enables WAL mode.
    /// PRAGMA settings are per connection, so this runs on every open.
    pub fn open(path: &Path) -> StorageResult<Connection> {
        let conn = Connection::open(path)?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            warn!(
                "Failed to set WAL mode on database {:?}. Current mode: {}. This may indicate the database is in use by another connection.",
                path.file_name(),
                journal_mode
            );
        } else {
            debug!("WAL mode activated for database {:?}", path.file_name());
        }

        Self::configure(&conn)?;
        Ok(conn)
    }

    /// In-memory database with the same pragmas, for tests and dry runs.
    pub fn open_in_memory() -> StorageResult<Connection> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(conn)
    }

    fn configure(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA temp_store=MEMORY;",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }
}
