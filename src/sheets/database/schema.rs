// src/sheets/database/schema.rs
// Table layout for a stored sheet: the grid table, its column metadata table,
// and the shared revision table.

use rusqlite::{params, Connection, OptionalExtension};

use super::error::{StorageError, StorageResult};
use super::helpers::{metadata_table_name, quote_identifier};
use super::Revision;
use crate::sheets::column_data_type::sql_type_for_column;
use crate::sheets::column_definition::ColumnDefinition;

pub const SYNC_STATE_TABLE: &str = "_SyncState";
pub const ROW_INDEX_COLUMN: &str = "row_index";

pub fn table_exists(conn: &Connection, table_name: &str) -> StorageResult<bool> {
    let exists = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
        [table_name],
        |row| row.get::<_, i32>(0).map(|v| v > 0),
    )?;
    Ok(exists)
}

/// Create the revision table if it doesn't exist
pub fn ensure_sync_state_table(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                table_name TEXT PRIMARY KEY,
                revision INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            SYNC_STATE_TABLE
        ),
        [],
    )?;
    Ok(())
}

pub fn read_revision(conn: &Connection, table_name: &str) -> StorageResult<Revision> {
    if !table_exists(conn, SYNC_STATE_TABLE)? {
        return Ok(Revision::INITIAL);
    }
    let revision: Option<i64> = conn
        .query_row(
            &format!("SELECT revision FROM {} WHERE table_name = ?", SYNC_STATE_TABLE),
            [table_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision.map_or(Revision::INITIAL, |r| Revision(r as u64)))
}

pub fn write_revision(conn: &Connection, table_name: &str, revision: Revision) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (table_name, revision) VALUES (?, ?) \
             ON CONFLICT(table_name) DO UPDATE SET revision = excluded.revision, updated_at = CURRENT_TIMESTAMP",
            SYNC_STATE_TABLE
        ),
        params![table_name, revision.0 as i64],
    )?;
    Ok(())
}

/// Drops and recreates the grid table and its metadata table for `columns`.
pub fn recreate_sheet_tables(
    conn: &Connection,
    table_name: &str,
    columns: &[ColumnDefinition],
) -> StorageResult<()> {
    if let Some(clash) = columns
        .iter()
        .find(|c| c.header.eq_ignore_ascii_case(ROW_INDEX_COLUMN))
    {
        return Err(StorageError::InvalidMetadata(format!(
            "column '{}' clashes with the reserved row position column",
            clash.header
        )));
    }

    let meta_table = metadata_table_name(table_name);
    conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table_name)), [])?;
    conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(&meta_table)), [])?;

    let mut column_sql = vec![format!("{} INTEGER PRIMARY KEY", ROW_INDEX_COLUMN)];
    column_sql.extend(
        columns
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.header), sql_type_for_column(c.data_type))),
    );
    conn.execute(
        &format!(
            "CREATE TABLE {} ({})",
            quote_identifier(table_name),
            column_sql.join(", ")
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE {} (
                column_index INTEGER PRIMARY KEY,
                column_name TEXT NOT NULL UNIQUE,
                data_type TEXT NOT NULL
            )",
            quote_identifier(&meta_table)
        ),
        [],
    )?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} (column_index, column_name, data_type) VALUES (?, ?, ?)",
        quote_identifier(&meta_table)
    ))?;
    for (idx, column) in columns.iter().enumerate() {
        stmt.execute(params![idx as i64, column.header, column.data_type.to_string()])?;
    }
    Ok(())
}
