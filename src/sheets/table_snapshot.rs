// src/sheets/table_snapshot.rs
//! Row-keyed, column-ordered table snapshots.
//!
//! A snapshot is immutable once built: edits produce a new snapshot. Row keys
//! come either from a business identifier column or from the stored row
//! position (`row_index`), and are unique within a snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::cell_value::CellValue;
use super::column_definition::ColumnDefinition;
use super::validation::ValidationError;

pub const DEFAULT_SHEET_NAME: &str = "TP Import";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    /// Key derived from a key-column cell. Integral numbers and numeric text
    /// produce the same key so `"7"`, `7` and `7.0` address the same row.
    pub fn from_cell(cell: &CellValue) -> Option<RowKey> {
        match cell {
            CellValue::Null => None,
            CellValue::Int(i) => Some(RowKey::Int(*i)),
            CellValue::Float(f) if f.is_nan() => None,
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some(RowKey::Int(*f as i64))
            }
            CellValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else if let Ok(i) = t.parse::<i64>() {
                    Some(RowKey::Int(i))
                } else {
                    Some(RowKey::Text(t.to_string()))
                }
            }
            other => Some(RowKey::Text(other.to_string())),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(i) => write!(f, "{}", i),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

/// Where row keys come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// A business identifier column, e.g. `Portfolio Epic`.
    Column(String),
    /// The stored row position.
    Position,
}

impl KeySource {
    pub fn from_column(column: Option<&str>) -> Self {
        match column {
            Some(c) if !c.trim().is_empty() => KeySource::Column(c.to_string()),
            _ => KeySource::Position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSnapshot {
    sheet_name: String,
    columns: Vec<ColumnDefinition>,
    key_source: KeySource,
    rows: Vec<Vec<CellValue>>,
    keys: Vec<RowKey>,
    index: HashMap<RowKey, usize>,
    // First position not used by this snapshot or the one it was derived from
    next_position: i64,
}

// Two snapshots are equal when they hold the same rows; position bookkeeping
// is not part of the value.
impl PartialEq for TableSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.sheet_name == other.sheet_name
            && self.columns == other.columns
            && self.key_source == other.key_source
            && self.keys == other.keys
            && self.rows == other.rows
    }
}

impl TableSnapshot {
    /// Builds a snapshot whose positional keys (if any) are `0..rows.len()`.
    pub fn new(
        sheet_name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        key_source: KeySource,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, ValidationError> {
        let row_indices = (0..rows.len() as i64).collect();
        Self::with_row_indices(sheet_name, columns, key_source, rows, row_indices)
    }

    /// Builds a snapshot carrying explicit stored row positions. The
    /// positions are the row keys when `key_source` is [`KeySource::Position`].
    pub fn with_row_indices(
        sheet_name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        key_source: KeySource,
        rows: Vec<Vec<CellValue>>,
        row_indices: Vec<i64>,
    ) -> Result<Self, ValidationError> {
        let mut seen_headers = HashSet::new();
        for column in &columns {
            if !seen_headers.insert(column.header.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.header.clone()));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ValidationError::RowWidth {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        let keys: Vec<RowKey> = match &key_source {
            KeySource::Position => {
                if row_indices.len() != rows.len() {
                    return Err(ValidationError::RowIndexCount {
                        rows: rows.len(),
                        keys: row_indices.len(),
                    });
                }
                row_indices.into_iter().map(RowKey::Int).collect()
            }
            KeySource::Column(name) => {
                let col = columns
                    .iter()
                    .position(|c| &c.header == name)
                    .ok_or_else(|| ValidationError::UnknownColumn(name.clone()))?;
                rows.iter()
                    .enumerate()
                    .map(|(i, row)| {
                        RowKey::from_cell(&row[col]).ok_or_else(|| ValidationError::MissingRowKey {
                            row: i,
                            column: name.clone(),
                        })
                    })
                    .collect::<Result<_, _>>()?
            }
        };

        Self::from_keyed_rows(sheet_name.into(), columns, key_source, rows, keys)
    }

    fn from_keyed_rows(
        sheet_name: String,
        columns: Vec<ColumnDefinition>,
        key_source: KeySource,
        rows: Vec<Vec<CellValue>>,
        keys: Vec<RowKey>,
    ) -> Result<Self, ValidationError> {
        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if let Some(first) = index.insert(key.clone(), i) {
                return Err(ValidationError::DuplicateRowKey {
                    key: key.to_string(),
                    first,
                    second: i,
                });
            }
        }
        let next_position = match key_source {
            KeySource::Position => keys
                .iter()
                .filter_map(|k| match k {
                    RowKey::Int(i) => Some(*i),
                    RowKey::Text(_) => None,
                })
                .max()
                .map_or(0, |m| m + 1),
            KeySource::Column(_) => rows.len() as i64,
        };
        Ok(Self {
            sheet_name,
            columns,
            key_source,
            rows,
            keys,
            index,
            next_position,
        })
    }

    /// Position the next appended row gets in a positionally keyed snapshot.
    /// Views keep their source's value, so a row added to a filtered view
    /// never reuses the position of a row the filter hid.
    pub fn next_position(&self) -> i64 {
        self.next_position
    }

    /// Raises [`Self::next_position`] to at least `next`.
    pub fn reserving_positions(mut self, next: i64) -> TableSnapshot {
        self.next_position = self.next_position.max(next);
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header == header)
    }

    pub fn key_source(&self) -> &KeySource {
        &self.key_source
    }

    pub fn key_column(&self) -> Option<&str> {
        match &self.key_source {
            KeySource::Column(name) => Some(name),
            KeySource::Position => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn contains_key(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    /// Rows in stored order, paired with their keys.
    pub fn rows(&self) -> impl Iterator<Item = (&RowKey, &[CellValue])> + '_ {
        self.keys.iter().zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn row(&self, key: &RowKey) -> Option<&[CellValue]> {
        self.index.get(key).map(|&i| self.rows[i].as_slice())
    }

    pub fn cell(&self, key: &RowKey, header: &str) -> Option<&CellValue> {
        let col = self.column_index(header)?;
        self.row(key).map(|row| &row[col])
    }

    /// Stored row positions. Positional keys are their own positions; keyed
    /// snapshots are stored in row order.
    pub fn row_indices(&self) -> Vec<i64> {
        match self.key_source {
            KeySource::Position => self
                .keys
                .iter()
                .map(|k| match k {
                    RowKey::Int(i) => *i,
                    RowKey::Text(_) => 0,
                })
                .collect(),
            KeySource::Column(_) => (0..self.rows.len() as i64).collect(),
        }
    }

    /// Same rows with the columns in `order`, which must name every column
    /// exactly once.
    pub fn reorder_columns(&self, order: &[String]) -> Result<TableSnapshot, ValidationError> {
        check_same_columns(&self.column_names()[..], order)?;
        let positions: Vec<usize> = order
            .iter()
            .map(|h| self.column_index(h).ok_or_else(|| ValidationError::UnknownColumn(h.clone())))
            .collect::<Result<_, _>>()?;
        let columns = positions.iter().map(|&p| self.columns[p].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
            .collect();
        Self::from_keyed_rows(
            self.sheet_name.clone(),
            columns,
            self.key_source.clone(),
            rows,
            self.keys.clone(),
        )
        .map(|s| s.reserving_positions(self.next_position))
    }

    /// Moves `header` to the front. Snapshots without that column are
    /// returned unchanged.
    pub fn with_leading_column(&self, header: &str) -> TableSnapshot {
        let Some(pos) = self.column_index(header) else {
            return self.clone();
        };
        let mut order: Vec<String> = self.columns.iter().map(|c| c.header.clone()).collect();
        let lead = order.remove(pos);
        order.insert(0, lead);
        // A permutation of our own columns cannot fail validation.
        self.reorder_columns(&order).unwrap_or_else(|_| self.clone())
    }

    /// Keeps the rows for which `keep` returns true. Keys are preserved so a
    /// filtered view still addresses the same rows as its source.
    pub fn retain_rows<F>(&self, mut keep: F) -> TableSnapshot
    where
        F: FnMut(&RowKey, &[CellValue]) -> bool,
    {
        let mut rows = Vec::new();
        let mut keys = Vec::new();
        for (key, row) in self.rows() {
            if keep(key, row) {
                rows.push(row.to_vec());
                keys.push(key.clone());
            }
        }
        let index = keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();
        TableSnapshot {
            sheet_name: self.sheet_name.clone(),
            columns: self.columns.clone(),
            key_source: self.key_source.clone(),
            rows,
            keys,
            index,
            next_position: self.next_position,
        }
    }

    /// Applies an edited (possibly filtered) view on top of this snapshot:
    /// rows present in the view replace ours, rows new in the view are
    /// appended, every other row is kept as is. Positions reserved by either
    /// side stay reserved.
    pub fn overlay(&self, view: &TableSnapshot) -> Result<TableSnapshot, ValidationError> {
        let order: Vec<String> = self.columns.iter().map(|c| c.header.clone()).collect();
        let view = view.reorder_columns(&order)?;

        let mut rows = Vec::with_capacity(self.len());
        let mut keys = Vec::with_capacity(self.len());
        for (key, row) in self.rows() {
            rows.push(view.row(key).unwrap_or(row).to_vec());
            keys.push(key.clone());
        }
        for (key, row) in view.rows() {
            if !self.contains_key(key) {
                rows.push(row.to_vec());
                keys.push(key.clone());
            }
        }
        Self::from_keyed_rows(
            self.sheet_name.clone(),
            self.columns.clone(),
            self.key_source.clone(),
            rows,
            keys,
        )
        .map(|s| s.reserving_positions(self.next_position.max(view.next_position)))
    }

    /// Returns a copy with one cell replaced. Editing the key column re-keys
    /// the row.
    pub fn with_cell(
        &self,
        key: &RowKey,
        header: &str,
        value: impl Into<CellValue>,
    ) -> Result<TableSnapshot, ValidationError> {
        let col = self
            .column_index(header)
            .ok_or_else(|| ValidationError::UnknownColumn(header.to_string()))?;
        let pos = *self
            .index
            .get(key)
            .ok_or_else(|| ValidationError::UnknownRow(key.to_string()))?;
        let mut rows = self.rows.clone();
        rows[pos][col] = value.into();
        let row_indices = self.row_indices();
        Self::with_row_indices(
            self.sheet_name.clone(),
            self.columns.clone(),
            self.key_source.clone(),
            rows,
            row_indices,
        )
        .map(|s| s.reserving_positions(self.next_position))
    }

    /// Returns a copy with `row` appended. Positional snapshots give the new
    /// row [`Self::next_position`].
    pub fn with_row(&self, row: Vec<CellValue>) -> Result<TableSnapshot, ValidationError> {
        let mut rows = self.rows.clone();
        let mut row_indices = self.row_indices();
        rows.push(row);
        row_indices.push(self.next_position);
        Self::with_row_indices(
            self.sheet_name.clone(),
            self.columns.clone(),
            self.key_source.clone(),
            rows,
            row_indices,
        )
        .map(|s| s.reserving_positions(self.next_position))
    }
}

/// Fails unless `actual` and `expected` name the same columns, ignoring order.
pub fn check_same_columns<S: AsRef<str>, T: AsRef<str>>(
    expected: &[S],
    actual: &[T],
) -> Result<(), ValidationError> {
    let expected_set: HashSet<&str> = expected.iter().map(AsRef::as_ref).collect();
    let actual_set: HashSet<&str> = actual.iter().map(AsRef::as_ref).collect();
    if expected_set == actual_set && expected.len() == actual.len() {
        return Ok(());
    }
    let missing = expected
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !actual_set.contains(c))
        .map(str::to_string)
        .collect::<Vec<_>>();
    let unexpected = actual
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !expected_set.contains(c))
        .map(str::to_string)
        .collect::<Vec<_>>();
    Err(ValidationError::ColumnMismatch {
        missing,
        unexpected,
    })
}
