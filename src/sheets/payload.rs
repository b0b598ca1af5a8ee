// src/sheets/payload.rs
//! Webhook payloads built from change records.
//!
//! The receiving endpoint decides the shape: [`PayloadMode::RowLevel`] sends
//! each changed row with its full field set (what the Targetprocess import
//! hook expects), [`PayloadMode::FieldLevel`] sends one entry per changed cell.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::diff::{ChangeKind, ChangeRecord};
use super::table_snapshot::{RowKey, TableSnapshot};

/// Marker field carried by row-level entries for deleted rows.
pub const DELETED_FIELD: &str = "_deleted";
/// Key field used for deleted rows of positionally keyed sheets.
pub const ROW_INDEX_FIELD: &str = "row_index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    #[default]
    #[value(name = "row")]
    RowLevel,
    #[value(name = "field")]
    FieldLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub row_key: RowKey,
    pub field: String,
    pub original_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Rows(Vec<Map<String, Value>>),
    Fields(Vec<FieldChange>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Rows(rows) => rows.len(),
            Payload::Fields(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Pretty JSON for the "data sent" display.
    pub fn preview(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unprintable payload: {}>", e))
    }
}

fn optional_json(value: Option<&super::cell_value::CellValue>) -> Value {
    value.map_or(Value::Null, |v| v.to_json())
}

/// Builds the payload for `changes`. Row-level entries take their values from
/// `full_rows`, the edited snapshot the changes were computed against.
pub fn build(changes: &[ChangeRecord], mode: PayloadMode, full_rows: &TableSnapshot) -> Payload {
    match mode {
        PayloadMode::FieldLevel => Payload::Fields(
            changes
                .iter()
                .map(|c| FieldChange {
                    row_key: c.row_key.clone(),
                    field: c.column.clone(),
                    original_value: optional_json(c.original.as_ref()),
                    new_value: optional_json(c.new.as_ref()),
                })
                .collect(),
        ),
        PayloadMode::RowLevel => {
            let mut entries = Vec::new();
            let mut last: Option<&RowKey> = None;
            for change in changes {
                if last == Some(&change.row_key) {
                    continue;
                }
                last = Some(&change.row_key);
                let entry = match full_rows.row(&change.row_key) {
                    Some(row) => full_rows
                        .columns()
                        .iter()
                        .zip(row)
                        .map(|(col, cell)| (col.header.clone(), cell.to_json()))
                        .collect(),
                    None if change.kind == ChangeKind::Deleted => {
                        deleted_entry(&change.row_key, full_rows.key_column())
                    }
                    None => continue,
                };
                entries.push(entry);
            }
            Payload::Rows(entries)
        }
    }
}

fn deleted_entry(key: &RowKey, key_column: Option<&str>) -> Map<String, Value> {
    let mut entry = Map::new();
    let key_value = serde_json::to_value(key).unwrap_or(Value::Null);
    entry.insert(key_column.unwrap_or(ROW_INDEX_FIELD).to_string(), key_value);
    entry.insert(DELETED_FIELD.to_string(), Value::Bool(true));
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::diff::{diff, DeletionPolicy, DiffOptions, DiffScope};
    use crate::sheets::table_snapshot::test_support::status_sheet;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_level_one_entry_per_change() {
        let base = status_sheet(&[(1, "Open"), (2, "Open"), (3, "Open")]);
        let edited = status_sheet(&[(1, "Closed"), (2, "Open"), (3, "Done")]);
        let changes = diff(&base, &edited, &DiffOptions::default()).unwrap();
        let payload = build(&changes, PayloadMode::FieldLevel, &edited);
        assert_eq!(payload.len(), 2);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!([
                {"row_key": 1, "field": "status", "original_value": "Open", "new_value": "Closed"},
                {"row_key": 3, "field": "status", "original_value": "Open", "new_value": "Done"},
            ])
        );
    }

    #[test]
    fn test_row_level_groups_by_row() {
        let base = status_sheet(&[(1, "Open")]);
        let edited = status_sheet(&[(1, "Closed"), (7, "New")]);
        let changes = diff(&base, &edited, &DiffOptions::default()).unwrap();
        assert_eq!(changes.len(), 3);
        let payload = build(&changes, PayloadMode::RowLevel, &edited);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!([
                {"id": 1, "status": "Closed"},
                {"id": 7, "status": "New"},
            ])
        );
    }

    #[test]
    fn test_row_level_keeps_column_order() {
        let base = status_sheet(&[(1, "Open")]);
        let edited = status_sheet(&[(1, "Closed")]).with_leading_column("status");
        let changes = diff(&base, &edited, &DiffOptions::default()).unwrap();
        let body = String::from_utf8(build(&changes, PayloadMode::RowLevel, &edited).to_body().unwrap())
            .unwrap();
        assert_eq!(body, r#"[{"status":"Closed","id":1}]"#);
    }

    #[test]
    fn test_deleted_rows_are_marked() {
        let base = status_sheet(&[(1, "Open"), (2, "Open")]);
        let edited = status_sheet(&[(1, "Open")]);
        let options = DiffOptions {
            scope: DiffScope::Full,
            deletions: DeletionPolicy::Report,
        };
        let changes = diff(&base, &edited, &options).unwrap();
        let payload = build(&changes, PayloadMode::RowLevel, &edited);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!([{"id": 2, "_deleted": true}])
        );
    }

    #[test]
    fn test_empty_changes_empty_payload() {
        let sheet = status_sheet(&[(1, "Open")]);
        for mode in [PayloadMode::RowLevel, PayloadMode::FieldLevel] {
            let payload = build(&[], mode, &sheet);
            assert!(payload.is_empty());
            assert_eq!(payload.to_body().unwrap(), b"[]");
        }
    }
}
