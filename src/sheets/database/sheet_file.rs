// src/sheets/database/sheet_file.rs
//! JSON workbook files.
//!
//! A workbook holds one or more named sheets plus a document-level revision:
//!
//! ```json
//! {
//!   "revision": 3,
//!   "sheets": [
//!     {
//!       "name": "TP Import",
//!       "columns": [{ "header": "Portfolio Epic", "data_type": "I64" }, "Status"],
//!       "rows": [[101, "Open"], { "Portfolio Epic": 102, "Status": "Closed" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Columns may be written as bare header strings (text columns). Rows may be
//! cell arrays in column order or objects keyed by header; missing fields read
//! as blank.
//!
//! Positionally keyed sheets also carry `row_indices` and `next_row_index`.
//! Rows listed after the last index (added by hand to an export) are given
//! fresh positions starting at `next_row_index`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::{check_revision, Revision, SnapshotStore, StoreLayout, StoredSnapshot};
use crate::sheets::cell_value::CellValue;
use crate::sheets::column_definition::ColumnDefinition;
use crate::sheets::table_snapshot::{KeySource, TableSnapshot};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetFile {
    #[serde(default)]
    pub revision: Revision,
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetEntry {
    pub name: String,
    pub columns: Vec<ColumnEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_indices: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_row_index: Option<i64>,
    #[serde(default)]
    pub rows: Vec<RowEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    Header(String),
    Defined(ColumnDefinition),
}

impl ColumnEntry {
    fn into_definition(self) -> ColumnDefinition {
        match self {
            ColumnEntry::Header(header) => ColumnDefinition::text(header),
            ColumnEntry::Defined(def) => def,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowEntry {
    Cells(Vec<JsonValue>),
    Record(Map<String, JsonValue>),
}

impl SheetFile {
    pub fn read(path: &Path) -> StorageResult<SheetFile> {
        let file = fs::File::open(path).map_err(|e| StorageError::io(path, e))?;
        let doc: SheetFile = serde_json::from_reader(BufReader::new(file))?;
        debug!("Read workbook {:?}: {} sheet(s), revision {}", path, doc.sheets.len(), doc.revision);
        Ok(doc)
    }

    /// Reads `path`, treating a missing file as an empty workbook.
    pub fn read_or_default(path: &Path) -> StorageResult<SheetFile> {
        match fs::metadata(path) {
            Ok(_) => Self::read(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SheetFile::default()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Writes next to `path` first and renames over it, so readers never see
    /// a half-written workbook.
    pub fn write(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let tmp_path = temp_path_for(path);
        {
            let file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush().map_err(|e| StorageError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }

    /// Finds `name`, or the only sheet when the workbook has exactly one.
    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| match self.sheets.as_slice() {
                [only] => Some(only),
                _ => None,
            })
    }

    /// Inserts or replaces the sheet named like `entry`.
    pub fn upsert_sheet(&mut self, entry: SheetEntry) {
        match self.sheets.iter_mut().find(|s| s.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.sheets.push(entry),
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl SheetEntry {
    pub fn from_snapshot(snapshot: &TableSnapshot) -> SheetEntry {
        let (row_indices, next_row_index) = match snapshot.key_source() {
            KeySource::Position => (Some(snapshot.row_indices()), Some(snapshot.next_position())),
            KeySource::Column(_) => (None, None),
        };
        SheetEntry {
            name: snapshot.sheet_name().to_string(),
            columns: snapshot.columns().iter().cloned().map(ColumnEntry::Defined).collect(),
            row_indices,
            next_row_index,
            rows: snapshot
                .rows()
                .map(|(_, row)| RowEntry::Cells(row.iter().map(CellValue::to_json).collect()))
                .collect(),
        }
    }

    pub fn to_snapshot(&self, key: &KeySource) -> StorageResult<TableSnapshot> {
        let columns: Vec<ColumnDefinition> =
            self.columns.iter().cloned().map(ColumnEntry::into_definition).collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        for entry in &self.rows {
            let cells = match entry {
                RowEntry::Cells(values) => {
                    let mut cells = Vec::with_capacity(values.len());
                    for (i, value) in values.iter().enumerate() {
                        // Extra trailing cells are kept so the width check reports them
                        let (data_type, header) = columns
                            .get(i)
                            .map(|c| (c.data_type, c.header.as_str()))
                            .unwrap_or_default();
                        cells.push(CellValue::from_json(value, data_type, header)?);
                    }
                    cells
                }
                RowEntry::Record(record) => {
                    let mut cells = Vec::with_capacity(columns.len());
                    for column in &columns {
                        let cell = match record.get(&column.header) {
                            Some(value) => CellValue::from_json(value, column.data_type, &column.header)?,
                            None => CellValue::Null,
                        };
                        cells.push(cell);
                    }
                    cells
                }
            };
            rows.push(cells);
        }

        let reserved = self.next_row_index.unwrap_or(0);
        let snapshot = match &self.row_indices {
            Some(indices) => {
                let mut indices = indices.clone();
                if indices.len() < rows.len() {
                    let first_free = indices.iter().map(|i| i + 1).max().unwrap_or(0).max(reserved);
                    let added = rows.len() - indices.len();
                    debug!("Sheet '{}': {} new row(s) from position {}", self.name, added, first_free);
                    indices.extend((first_free..).take(added));
                }
                TableSnapshot::with_row_indices(&self.name, columns, key.clone(), rows, indices)?
            }
            None => TableSnapshot::new(&self.name, columns, key.clone(), rows)?,
        };
        Ok(snapshot.reserving_positions(reserved))
    }
}

/// Reads one sheet of a workbook, e.g. an edited export handed back by a user.
pub fn read_snapshot(path: &Path, layout: &StoreLayout) -> StorageResult<TableSnapshot> {
    let doc = SheetFile::read(path)?;
    let entry = doc
        .sheet(&layout.sheet_name)
        .ok_or_else(|| StorageError::SheetNotFound(layout.sheet_name.clone()))?;
    entry.to_snapshot(&layout.key)
}

/// Writes `snapshot` as a single-sheet workbook.
pub fn write_snapshot(path: &Path, snapshot: &TableSnapshot) -> StorageResult<()> {
    let mut doc = SheetFile::default();
    doc.upsert_sheet(SheetEntry::from_snapshot(snapshot));
    doc.write(path)
}

/// Baseline table kept in a workbook file. Other sheets in the file are
/// preserved on persist.
pub struct SheetFileStore {
    path: PathBuf,
    layout: StoreLayout,
}

impl SheetFileStore {
    pub fn new(path: impl Into<PathBuf>, layout: StoreLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

}

impl SnapshotStore for SheetFileStore {
    fn load(&self) -> StorageResult<StoredSnapshot> {
        let doc = match SheetFile::read(&self.path) {
            Err(StorageError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                return Err(StorageError::SheetNotFound(self.layout.sheet_name.clone()))
            }
            other => other?,
        };
        let entry = doc
            .sheet(&self.layout.sheet_name)
            .ok_or_else(|| StorageError::SheetNotFound(self.layout.sheet_name.clone()))?;
        let snapshot = entry.to_snapshot(&self.layout.key)?;
        Ok(StoredSnapshot {
            snapshot,
            revision: doc.revision,
        })
    }

    fn persist(&mut self, snapshot: &TableSnapshot, expected: Option<Revision>) -> StorageResult<Revision> {
        let mut doc = SheetFile::read_or_default(&self.path)?;
        check_revision(expected, doc.revision)?;

        let mut entry = SheetEntry::from_snapshot(snapshot);
        entry.name = self.layout.sheet_name.clone();
        doc.upsert_sheet(entry);
        doc.revision = doc.revision.next();
        doc.write(&self.path)?;

        info!(
            "Persisted {} rows to sheet '{}' in {:?} (revision {})",
            snapshot.len(),
            self.layout.sheet_name,
            self.path,
            doc.revision
        );
        Ok(doc.revision)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::column_data_type::ColumnDataType;
    use crate::sheets::table_snapshot::test_support::status_sheet;
    use crate::sheets::table_snapshot::RowKey;
    use crate::sheets::validation::ValidationError;
    use chrono::NaiveDate;

    fn keyed_layout() -> StoreLayout {
        StoreLayout {
            key: KeySource::Column("id".into()),
            ..StoreLayout::default()
        }
    }

    #[test]
    fn test_reads_loose_columns_and_record_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        fs::write(
            &path,
            r#"{
                "sheets": [{
                    "name": "Anything",
                    "columns": [{"header": "id", "data_type": "int"}, "status", {"header": "due", "data_type": "date"}],
                    "rows": [[1, "Open", "2024-01-31"], {"status": "Closed", "id": "2"}]
                }]
            }"#,
        )
        .unwrap();

        let snapshot = read_snapshot(&path, &keyed_layout()).unwrap();
        assert_eq!(snapshot.columns()[0].data_type, ColumnDataType::I64);
        assert_eq!(
            snapshot.cell(&RowKey::Int(1), "due"),
            Some(&CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))
        );
        assert_eq!(snapshot.cell(&RowKey::Int(2), "status"), Some(&CellValue::text("Closed")));
        assert_eq!(snapshot.cell(&RowKey::Int(2), "due"), Some(&CellValue::Null));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        fs::write(
            &path,
            r#"{"sheets": [{"name": "TP Import", "columns": ["a"], "rows": [["x", "y"]]}]}"#,
        )
        .unwrap();
        let err = read_snapshot(&path, &StoreLayout::default()).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Snapshot(ValidationError::RowWidth { row: 0, expected: 1, found: 2 })
        ));
    }

    #[test]
    fn test_missing_file_is_sheet_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SheetFileStore::new(dir.path().join("none.json"), StoreLayout::default());
        assert!(matches!(store.load(), Err(StorageError::SheetNotFound(_))));
    }

    #[test]
    fn test_persist_keeps_other_sheets_and_bumps_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.json");
        let mut doc = SheetFile::default();
        doc.upsert_sheet(SheetEntry {
            name: "Notes".into(),
            columns: vec![ColumnEntry::Header("text".into())],
            row_indices: None,
            next_row_index: None,
            rows: vec![RowEntry::Cells(vec![JsonValue::from("keep me")])],
        });
        doc.write(&path).unwrap();

        let mut store = SheetFileStore::new(&path, keyed_layout());
        let revision = store.persist(&status_sheet(&[(1, "Open")]), Some(Revision(0))).unwrap();
        assert_eq!(revision, Revision(1));

        let doc = SheetFile::read(&path).unwrap();
        assert_eq!(doc.sheets.len(), 2);
        assert!(doc.sheets.iter().any(|s| s.name == "Notes"));
        assert!(!dir.path().join("workbook.json.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.revision, Revision(1));
        assert_eq!(loaded.snapshot, status_sheet(&[(1, "Open")]));
    }

    #[test]
    fn test_stale_revision_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.json");
        let mut store = SheetFileStore::new(&path, keyed_layout());
        store.persist(&status_sheet(&[(1, "Open")]), None).unwrap();
        store.persist(&status_sheet(&[(1, "Closed")]), Some(Revision(1))).unwrap();

        let err = store.persist(&status_sheet(&[(1, "Lost")]), Some(Revision(1))).unwrap_err();
        assert!(matches!(err, StorageError::RevisionConflict { .. }));
        assert_eq!(
            store.load().unwrap().snapshot.cell(&RowKey::Int(1), "status"),
            Some(&CellValue::text("Closed"))
        );
    }

    #[test]
    fn test_positional_rows_keep_their_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.json");
        let snapshot = TableSnapshot::with_row_indices(
            "TP Import",
            vec![ColumnDefinition::new("Effort", ColumnDataType::F64)],
            KeySource::Position,
            vec![vec![CellValue::Float(1.5)], vec![CellValue::Null]],
            vec![4, 9],
        )
        .unwrap();
        write_snapshot(&path, &snapshot).unwrap();
        assert_eq!(read_snapshot(&path, &StoreLayout::default()).unwrap(), snapshot);
    }

    #[test]
    fn test_rows_added_to_filtered_export_get_fresh_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        let names = TableSnapshot::new(
            "TP Import",
            vec![ColumnDefinition::text("name")],
            KeySource::Position,
            vec![vec!["a".into()], vec!["b".into()], vec!["c".into()]],
        )
        .unwrap();
        write_snapshot(&path, &names.retain_rows(|k, _| *k == RowKey::Int(0))).unwrap();

        let mut doc = SheetFile::read(&path).unwrap();
        assert_eq!(doc.sheets[0].next_row_index, Some(3));
        doc.sheets[0].rows.push(RowEntry::Cells(vec![JsonValue::from("d")]));
        doc.sheets[0].rows.push(RowEntry::Cells(vec![JsonValue::from("e")]));
        doc.write(&path).unwrap();

        let edited = read_snapshot(&path, &StoreLayout::default()).unwrap();
        assert_eq!(edited.keys(), &[RowKey::Int(0), RowKey::Int(3), RowKey::Int(4)]);
        assert_eq!(edited.cell(&RowKey::Int(3), "name"), Some(&CellValue::text("d")));
    }

    #[test]
    fn test_hand_written_indices_extend_past_the_largest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        fs::write(
            &path,
            r#"{"sheets": [{"name": "TP Import", "columns": ["name"], "row_indices": [7, 2], "rows": [["x"], ["y"], ["z"]]}]}"#,
        )
        .unwrap();
        let edited = read_snapshot(&path, &StoreLayout::default()).unwrap();
        assert_eq!(edited.keys(), &[RowKey::Int(7), RowKey::Int(2), RowKey::Int(8)]);

        fs::write(
            &path,
            r#"{"sheets": [{"name": "TP Import", "columns": ["name"], "row_indices": [0, 1], "rows": [["x"]]}]}"#,
        )
        .unwrap();
        let err = read_snapshot(&path, &StoreLayout::default()).unwrap_err();
        assert!(matches!(err, StorageError::Snapshot(ValidationError::RowIndexCount { rows: 1, keys: 2 })));
    }
}
