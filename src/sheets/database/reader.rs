// src/sheets/database/reader.rs

use rusqlite::Connection;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::helpers::{build_select_sql, metadata_table_name, quote_identifier};
use super::schema::table_exists;
use crate::sheets::cell_value::CellValue;
use crate::sheets::column_data_type::{parse_column_data_type, ColumnDataType};
use crate::sheets::column_definition::ColumnDefinition;
use crate::sheets::table_snapshot::{KeySource, TableSnapshot};

pub struct DbReader;

impl DbReader {
    /// Read column definitions in stored order
    pub fn read_columns(conn: &Connection, table_name: &str) -> StorageResult<Vec<ColumnDefinition>> {
        let meta_table = metadata_table_name(table_name);
        if !table_exists(conn, &meta_table)? {
            // Legacy tables without metadata: fall back to the physical schema
            return Self::read_physical_columns(conn, table_name);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT column_name, data_type FROM {} ORDER BY column_index",
            quote_identifier(&meta_table)
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, type_str)| {
                let data_type = parse_column_data_type(&type_str).ok_or_else(|| {
                    StorageError::InvalidMetadata(format!(
                        "column '{}' has unknown data type '{}'",
                        name, type_str
                    ))
                })?;
                Ok(ColumnDefinition::new(name, data_type))
            })
            .collect()
    }

    fn read_physical_columns(conn: &Connection, table_name: &str) -> StorageResult<Vec<ColumnDefinition>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table_name)))?;
        let columns = stmt
            .query_map([], |r| Ok((r.get::<_, String>(1)?, r.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|(name, _)| name != "row_index")
            .map(|(name, type_str)| {
                let data_type = match type_str.to_uppercase().as_str() {
                    "INTEGER" => ColumnDataType::I64,
                    "REAL" => ColumnDataType::F64,
                    _ => ColumnDataType::String,
                };
                ColumnDefinition::new(name, data_type)
            })
            .collect();
        Ok(columns)
    }

    /// Read every grid row as `(row_index, cells)` in stored order
    pub fn read_grid_data(
        conn: &Connection,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> StorageResult<(Vec<i64>, Vec<Vec<CellValue>>)> {
        let headers: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
        let query = build_select_sql(table_name, &headers);
        debug!("Prepared read_grid_data SQL for '{}': {}", table_name, query);

        let mut stmt = conn.prepare(&query)?;
        let mut rows = stmt.query([])?;
        let mut row_indices = Vec::new();
        let mut grid = Vec::new();
        while let Some(row) = rows.next()? {
            row_indices.push(row.get::<_, i64>(0)?);
            let mut cells = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_ref(i + 1)?;
                cells.push(CellValue::from_sql(value, column.data_type, &column.header)?);
            }
            grid.push(cells);
        }
        Ok((row_indices, grid))
    }

    /// Read a whole sheet into a snapshot
    pub fn read_sheet(
        conn: &Connection,
        table_name: &str,
        sheet_name: &str,
        key_source: &KeySource,
    ) -> StorageResult<TableSnapshot> {
        if !table_exists(conn, table_name)? {
            return Err(StorageError::SheetNotFound(table_name.to_string()));
        }
        let columns = Self::read_columns(conn, table_name)?;
        let (row_indices, grid) = Self::read_grid_data(conn, table_name, &columns)?;
        let snapshot =
            TableSnapshot::with_row_indices(sheet_name, columns, key_source.clone(), grid, row_indices)?;
        Ok(snapshot)
    }
}
