// src/sheets/database/writer.rs

use rusqlite::{Connection, ToSql};

use crate::sheets::cell_value::CellValue;

use super::error::StorageResult;
use super::helpers::build_insert_sql;
use super::schema::{ensure_sync_state_table, recreate_sheet_tables, write_revision};
use super::Revision;
use crate::sheets::table_snapshot::TableSnapshot;

pub struct DbWriter;

impl DbWriter {
    /// Insert grid data rows, `row_index` taken from the snapshot. Cells are
    /// converted for their column first so they read back as the same value.
    pub fn insert_grid_data(
        conn: &Connection,
        table_name: &str,
        snapshot: &TableSnapshot,
    ) -> StorageResult<()> {
        let column_names = snapshot.column_names();
        let insert_sql = build_insert_sql(table_name, &column_names);
        let mut stmt = conn.prepare(&insert_sql)?;
        let columns = snapshot.columns();

        for ((_, row), row_index) in snapshot.rows().zip(snapshot.row_indices()) {
            let cells: Vec<CellValue> = row
                .iter()
                .zip(columns)
                .map(|(cell, column)| cell.stored_as(column.data_type))
                .collect();
            let mut params_vec: Vec<&dyn ToSql> = Vec::with_capacity(cells.len() + 1);
            params_vec.push(&row_index);
            params_vec.extend(cells.iter().map(|cell| cell as &dyn ToSql));
            stmt.execute(rusqlite::params_from_iter(params_vec))?;
        }

        Ok(())
    }

    /// Replace the stored sheet with `snapshot` and record `revision`.
    /// Runs on whatever transaction the caller has open.
    pub fn replace_sheet(
        conn: &Connection,
        table_name: &str,
        snapshot: &TableSnapshot,
        revision: Revision,
    ) -> StorageResult<()> {
        ensure_sync_state_table(conn)?;
        recreate_sheet_tables(conn, table_name, snapshot.columns())?;
        Self::insert_grid_data(conn, table_name, snapshot)?;
        write_revision(conn, table_name, revision)?;
        Ok(())
    }
}
