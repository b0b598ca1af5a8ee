// src/sheets/column_data_type.rs
use serde::{
    de::{self, Deserializer},
    Deserialize, Serialize,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ColumnDataType {
    #[default]
    String,
    Bool,
    I64,
    F64,
    Date,
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// Sheet files written by hand or by older exports use loose type names
impl<'de> Deserialize<'de> for ColumnDataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        let as_str = match v {
            serde_json::Value::String(s) => s,
            other => {
                return Err(de::Error::custom(format!(
                    "ColumnDataType must be string, got {}",
                    other
                )))
            }
        };
        parse_column_data_type(&as_str)
            .ok_or_else(|| de::Error::custom(format!("Unknown ColumnDataType '{}'", as_str)))
    }
}

pub fn parse_column_data_type(s: &str) -> Option<ColumnDataType> {
    match s.trim() {
        "String" | "string" | "Text" | "text" | "object" => Some(ColumnDataType::String),
        "Bool" | "bool" | "Boolean" | "boolean" => Some(ColumnDataType::Bool),
        "I64" | "i64" | "Int" | "int" | "int64" | "Integer" | "integer" => {
            Some(ColumnDataType::I64)
        }
        "F64" | "f64" | "Float" | "float" | "float64" | "Number" | "number" => {
            Some(ColumnDataType::F64)
        }
        "Date" | "date" | "datetime64" | "datetime" => Some(ColumnDataType::Date),
        _ => None,
    }
}

/// SQLite storage class used for a column of the given type.
pub fn sql_type_for_column(data_type: ColumnDataType) -> &'static str {
    match data_type {
        ColumnDataType::String => "TEXT",
        // `true`/`false` text, so a 0/1 typed into the column stays a number
        ColumnDataType::Bool => "TEXT",
        ColumnDataType::I64 => "INTEGER",
        ColumnDataType::F64 => "REAL",
        ColumnDataType::Date => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_column_data_type("int64"), Some(ColumnDataType::I64));
        assert_eq!(parse_column_data_type(" Float "), Some(ColumnDataType::F64));
        assert_eq!(parse_column_data_type("datetime64"), Some(ColumnDataType::Date));
        assert_eq!(parse_column_data_type("blob"), None);
    }

    #[test]
    fn test_deserialize_rejects_non_string() {
        let err = serde_json::from_str::<ColumnDataType>("5").unwrap_err();
        assert!(err.to_string().contains("must be string"));
        let ok: ColumnDataType = serde_json::from_str("\"Date\"").unwrap();
        assert_eq!(ok, ColumnDataType::Date);
    }
}
