// src/sheets/filter.rs
// Column/value text filter applied to a snapshot to produce the edited view

use std::fmt;
use std::str::FromStr;

use super::table_snapshot::TableSnapshot;
use super::validation::ValidationError;

/// Case-insensitive substring filter over one column, or over every column
/// when `column` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: Option<String>,
    pub needle: String,
}

impl RowFilter {
    pub fn on_column(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            needle: needle.into(),
        }
    }

    pub fn anywhere(needle: impl Into<String>) -> Self {
        Self {
            column: None,
            needle: needle.into(),
        }
    }

    pub fn apply(&self, snapshot: &TableSnapshot) -> Result<TableSnapshot, ValidationError> {
        let needle = self.needle.to_lowercase();
        if needle.is_empty() {
            return Ok(snapshot.clone());
        }
        let matches = |text: String| text.to_lowercase().contains(&needle);

        match &self.column {
            Some(column) => {
                let col = snapshot
                    .column_index(column)
                    .ok_or_else(|| ValidationError::UnknownColumn(column.clone()))?;
                Ok(snapshot.retain_rows(|_, row| matches(row[col].to_string())))
            }
            None => Ok(snapshot.retain_rows(|_, row| row.iter().any(|c| matches(c.to_string())))),
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}={}", column, self.needle),
            None => f.write_str(&self.needle),
        }
    }
}

/// Parses `COLUMN=TEXT`. Input without `=` searches every column.
impl FromStr for RowFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((column, _)) if column.trim().is_empty() => {
                Err(format!("filter '{}' has an empty column name", s))
            }
            Some((column, needle)) => Ok(RowFilter::on_column(column.trim(), needle)),
            None => Ok(RowFilter::anywhere(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table_snapshot::test_support::status_sheet;
    use crate::sheets::table_snapshot::RowKey;

    #[test]
    fn test_column_filter_keeps_keys() {
        let sheet = status_sheet(&[(1, "Open"), (2, "Closed"), (3, "Reopened")]);
        let view = RowFilter::on_column("status", "open").apply(&sheet).unwrap();
        assert_eq!(view.keys(), &[RowKey::Int(1), RowKey::Int(3)]);
    }

    #[test]
    fn test_any_column_filter() {
        let sheet = status_sheet(&[(12, "Open"), (2, "Closed")]);
        let view = RowFilter::anywhere("2").apply(&sheet).unwrap();
        assert_eq!(view.len(), 2);
        let view = RowFilter::anywhere("clo").apply(&sheet).unwrap();
        assert_eq!(view.keys(), &[RowKey::Int(2)]);
    }

    #[test]
    fn test_unknown_column() {
        let sheet = status_sheet(&[(1, "Open")]);
        let err = RowFilter::on_column("owner", "x").apply(&sheet).unwrap_err();
        assert_eq!(err, ValidationError::UnknownColumn("owner".into()));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "status=Open".parse::<RowFilter>().unwrap(),
            RowFilter::on_column("status", "Open")
        );
        assert_eq!("Open".parse::<RowFilter>().unwrap(), RowFilter::anywhere("Open"));
        assert!("=Open".parse::<RowFilter>().is_err());
    }
}
