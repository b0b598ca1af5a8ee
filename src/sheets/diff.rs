// src/sheets/diff.rs
//! Cell-level change detection between a baseline snapshot and an edited one.
//!
//! Rows are matched by row key, never by position, and cells are compared with
//! [`CellValue::semantic_eq`]. The edited snapshot may be a filtered view of
//! the baseline; only keys present in the view are compared.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::cell_value::CellValue;
use super::table_snapshot::{check_same_columns, RowKey, TableSnapshot};
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffScope {
    /// The edited snapshot holds every row.
    #[default]
    Full,
    /// The edited snapshot is a filtered view. Baseline rows missing from it
    /// are out of scope, not deleted.
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Rows missing from the edited snapshot produce no change records.
    #[default]
    Ignore,
    /// In full scope, rows missing from the edited snapshot are reported as
    /// deleted, one record per column.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffOptions {
    pub scope: DiffScope,
    pub deletions: DeletionPolicy,
}

impl DiffOptions {
    pub fn filtered() -> Self {
        Self {
            scope: DiffScope::Filtered,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Updated,
    Inserted,
    Deleted,
}

/// One changed cell. `None` means the cell is absent on that side (an
/// inserted or deleted row).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub row_key: RowKey,
    pub column: String,
    pub original: Option<CellValue>,
    pub new: Option<CellValue>,
    pub kind: ChangeKind,
}

struct Absent<'a>(Option<&'a CellValue>);

impl fmt::Display for Absent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("(none)"),
        }
    }
}

impl ChangeRecord {
    /// Operator-facing description, e.g.
    /// `status for 1 changed from Open to Closed`.
    pub fn describe(&self) -> String {
        format!(
            "{} for {} changed from {} to {}",
            self.column,
            self.row_key,
            Absent(self.original.as_ref()),
            Absent(self.new.as_ref())
        )
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Computes the changed cells of `edited` relative to `baseline`, ordered by
/// row key then by the baseline's column order.
pub fn diff(
    baseline: &TableSnapshot,
    edited: &TableSnapshot,
    options: &DiffOptions,
) -> Result<Vec<ChangeRecord>, ValidationError> {
    let columns = baseline.column_names();
    check_same_columns(&columns[..], &edited.column_names()[..])?;

    // edited position of each baseline column
    let mapping: Vec<usize> = columns
        .iter()
        .map(|h| {
            edited
                .column_index(h)
                .ok_or_else(|| ValidationError::UnknownColumn(h.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let mut by_key: BTreeMap<&RowKey, Vec<ChangeRecord>> = BTreeMap::new();

    for (key, edited_row) in edited.rows() {
        let records = match baseline.row(key) {
            Some(base_row) => columns
                .iter()
                .enumerate()
                .filter_map(|(i, header)| {
                    let before = &base_row[i];
                    let after = &edited_row[mapping[i]];
                    (!before.semantic_eq(after)).then(|| ChangeRecord {
                        row_key: key.clone(),
                        column: header.to_string(),
                        original: Some(before.clone()),
                        new: Some(after.clone()),
                        kind: ChangeKind::Updated,
                    })
                })
                .collect::<Vec<_>>(),
            None => columns
                .iter()
                .enumerate()
                .map(|(i, header)| ChangeRecord {
                    row_key: key.clone(),
                    column: header.to_string(),
                    original: None,
                    new: Some(edited_row[mapping[i]].clone()),
                    kind: ChangeKind::Inserted,
                })
                .collect(),
        };
        if !records.is_empty() {
            by_key.insert(key, records);
        }
    }

    if options.scope == DiffScope::Full && options.deletions == DeletionPolicy::Report {
        for (key, base_row) in baseline.rows() {
            if edited.contains_key(key) {
                continue;
            }
            let records = columns
                .iter()
                .zip(base_row)
                .map(|(header, before)| ChangeRecord {
                    row_key: key.clone(),
                    column: header.to_string(),
                    original: Some(before.clone()),
                    new: None,
                    kind: ChangeKind::Deleted,
                })
                .collect();
            by_key.insert(key, records);
        }
    }

    Ok(by_key.into_values().flatten().collect())
}
