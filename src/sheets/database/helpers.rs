// src/sheets/database/helpers.rs
// Helper functions for SQL generation

/// Quote a SQL identifier by wrapping it in double quotes.
/// Embedded quotes are doubled so column headers can contain any character.
///
/// # Example
/// ```
/// use grid_sync::sheets::database::helpers::quote_identifier;
/// assert_eq!(quote_identifier("Portfolio Epic"), "\"Portfolio Epic\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build a comma-separated list of quoted column names.
pub fn quote_column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|name| quote_identifier(name.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a string of SQL placeholders (?, ?, ?, ...).
pub fn build_placeholders(count: usize) -> String {
    (0..count).map(|_| "?").collect::<Vec<_>>().join(", ")
}

/// Build the INSERT statement for one grid row, `row_index` first.
pub fn build_insert_sql<S: AsRef<str>>(table_name: &str, columns: &[S]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} (row_index) VALUES (?)", quote_identifier(table_name));
    }
    format!(
        "INSERT INTO {} (row_index, {}) VALUES (?, {})",
        quote_identifier(table_name),
        quote_column_list(columns),
        build_placeholders(columns.len())
    )
}

/// Build the SELECT statement reading grid rows in stored order.
pub fn build_select_sql<S: AsRef<str>>(table_name: &str, columns: &[S]) -> String {
    let mut select = vec!["row_index".to_string()];
    select.extend(columns.iter().map(|c| quote_identifier(c.as_ref())));
    format!(
        "SELECT {} FROM {} ORDER BY row_index",
        select.join(", "),
        quote_identifier(table_name)
    )
}

/// Get the metadata table name for a given table.
pub fn metadata_table_name(table_name: &str) -> String {
    format!("{}_Metadata", table_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Name"), "\"Name\"");
        assert_eq!(quote_identifier("Portfolio Epic"), "\"Portfolio Epic\"");
        assert_eq!(quote_identifier("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_build_placeholders() {
        assert_eq!(build_placeholders(0), "");
        assert_eq!(build_placeholders(1), "?");
        assert_eq!(build_placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_build_insert_sql() {
        let cols = vec!["Portfolio Epic".to_string(), "Status".to_string()];
        assert_eq!(
            build_insert_sql("tp_import", &cols),
            "INSERT INTO \"tp_import\" (row_index, \"Portfolio Epic\", \"Status\") VALUES (?, ?, ?)"
        );
        let none: Vec<String> = Vec::new();
        assert_eq!(
            build_insert_sql("tp_import", &none),
            "INSERT INTO \"tp_import\" (row_index) VALUES (?)"
        );
    }

    #[test]
    fn test_build_select_sql() {
        assert_eq!(
            build_select_sql("tp_import", &["A", "B"]),
            "SELECT row_index, \"A\", \"B\" FROM \"tp_import\" ORDER BY row_index"
        );
    }

    #[test]
    fn test_metadata_table_name() {
        assert_eq!(metadata_table_name("tp_import"), "tp_import_Metadata");
    }
}
