// src/sheets/cell_value.rs
//! Typed grid cell values.
//!
//! Grid edits arrive as loosely typed values (a number typed into a text
//! column, a date pasted as a string), so comparisons between a stored value
//! and an edited value go through [`CellValue::semantic_eq`] rather than
//! structural equality.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

use super::column_data_type::{sql_type_for_column, ColumnDataType};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellValueError {
    #[error("unsupported cell value in column '{column}': {found}")]
    UnsupportedJson { column: String, found: String },
    #[error("binary data is not supported in column '{0}'")]
    Blob(String),
    #[error("invalid UTF-8 text in column '{0}'")]
    Utf8(String),
}

/// Normalised form used for value equality.
#[derive(Debug, PartialEq)]
enum Comparable<'a> {
    Blank,
    Int(i64),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Text(&'a str),
}

// Integral floats beyond this lose precision when cast to i64
const MAX_EXACT_INTEGRAL: f64 = 9.0e15;

fn comparable_float<'a>(f: f64) -> Comparable<'a> {
    if f.is_nan() {
        Comparable::Blank
    } else if f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGRAL {
        Comparable::Int(f as i64)
    } else {
        Comparable::Number(f)
    }
}

fn parse_finite_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses `YYYY-MM-DD`, or a midnight timestamp as exported by spreadsheet
/// tools (`2024-01-05 00:00:00`). Timestamps with a time of day stay text.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(d);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .filter(|dt| dt.time() == chrono::NaiveTime::MIN)
        .map(|dt| dt.date())
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Null, NaN and whitespace-only text are all blank cells.
    pub fn is_blank(&self) -> bool {
        matches!(self.comparable(), Comparable::Blank)
    }

    fn comparable(&self) -> Comparable<'_> {
        match self {
            CellValue::Null => Comparable::Blank,
            CellValue::Bool(b) => Comparable::Bool(*b),
            CellValue::Int(i) => Comparable::Int(*i),
            CellValue::Float(f) => comparable_float(*f),
            CellValue::Date(d) => Comparable::Date(*d),
            CellValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    Comparable::Blank
                } else if let Ok(i) = t.parse::<i64>() {
                    Comparable::Int(i)
                } else if let Some(f) = parse_finite_f64(t) {
                    comparable_float(f)
                } else if let Some(b) = parse_bool(t) {
                    Comparable::Bool(b)
                } else if let Some(d) = parse_date(t) {
                    Comparable::Date(d)
                } else {
                    Comparable::Text(s.as_str())
                }
            }
        }
    }

    /// Value equality with type-aware coercion: `1`, `1.0` and `"1"` are the
    /// same value, as are a date and its ISO text.
    pub fn semantic_eq(&self, other: &CellValue) -> bool {
        self.comparable() == other.comparable()
    }

    /// Interprets free text according to the column's declared type. Text
    /// that does not parse is kept verbatim.
    pub fn coerce_text(s: &str, data_type: ColumnDataType) -> CellValue {
        let t = s.trim();
        let parsed = match data_type {
            ColumnDataType::String => None,
            ColumnDataType::I64 => t.parse::<i64>().ok().map(CellValue::Int),
            ColumnDataType::F64 => parse_finite_f64(t).map(CellValue::Float),
            ColumnDataType::Bool => parse_bool(t).map(CellValue::Bool),
            ColumnDataType::Date => parse_date(t).map(CellValue::Date),
        };
        parsed.unwrap_or_else(|| CellValue::Text(s.to_string()))
    }

    pub fn from_json(
        value: &JsonValue,
        data_type: ColumnDataType,
        column: &str,
    ) -> Result<CellValue, CellValueError> {
        let cell = match value {
            JsonValue::Null => CellValue::Null,
            JsonValue::Bool(b) => CellValue::Bool(*b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) if data_type == ColumnDataType::F64 => CellValue::Float(i as f64),
                (Some(i), _) => CellValue::Int(i),
                (None, Some(f))
                    if data_type == ColumnDataType::I64
                        && f.fract() == 0.0
                        && f.abs() < MAX_EXACT_INTEGRAL =>
                {
                    CellValue::Int(f as i64)
                }
                (None, Some(f)) => CellValue::Float(f),
                (None, None) => CellValue::Null,
            },
            JsonValue::String(s) => CellValue::coerce_text(s, data_type),
            other => {
                return Err(CellValueError::UnsupportedJson {
                    column: column.to_string(),
                    found: other.to_string(),
                })
            }
        };
        Ok(cell)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::Null,
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Int(i) => JsonValue::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// The value to bind when writing into a column of `data_type`.
    ///
    /// SQLite converts values to the column's storage class on insert, and
    /// its own number-to-text conversion would turn `true` into `"1"` and
    /// round floats. Booleans are therefore written as `true`/`false` and
    /// numbers bound for text columns are formatted here.
    pub fn stored_as(&self, data_type: ColumnDataType) -> CellValue {
        match self {
            CellValue::Float(f) if f.is_nan() => CellValue::Null,
            CellValue::Bool(b) => CellValue::Text(b.to_string()),
            CellValue::Int(_) | CellValue::Float(_) if sql_type_for_column(data_type) == "TEXT" => {
                CellValue::Text(self.to_string())
            }
            other => other.clone(),
        }
    }

    pub fn from_sql(
        value: ValueRef<'_>,
        data_type: ColumnDataType,
        column: &str,
    ) -> Result<CellValue, CellValueError> {
        let cell = match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => match data_type {
                ColumnDataType::Bool => CellValue::Bool(i != 0),
                ColumnDataType::F64 => CellValue::Float(i as f64),
                _ => CellValue::Int(i),
            },
            ValueRef::Real(f) => CellValue::Float(f),
            ValueRef::Text(bytes) => {
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| CellValueError::Utf8(column.to_string()))?;
                CellValue::coerce_text(s, data_type)
            }
            ValueRef::Blob(_) => return Err(CellValueError::Blob(column.to_string())),
        };
        Ok(cell)
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            CellValue::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            CellValue::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            CellValue::Float(f) if f.is_nan() => ToSqlOutput::Owned(SqlValue::Null),
            CellValue::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Date(d) => {
                ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string()))
            }
        })
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}
