// src/sheets/column_definition.rs
use serde::{Deserialize, Serialize};

use super::column_data_type::ColumnDataType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub header: String,
    #[serde(default)]
    pub data_type: ColumnDataType,
}

impl ColumnDefinition {
    pub fn new(header: impl Into<String>, data_type: ColumnDataType) -> Self {
        Self {
            header: header.into(),
            data_type,
        }
    }

    pub fn text(header: impl Into<String>) -> Self {
        Self::new(header, ColumnDataType::String)
    }
}
