use crate::table::Table;

/// One projected output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub table: String,
    pub column: String,
}

impl ColumnSpec {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Result-column label: `<table><separator><column>`.
    pub fn alias(&self, separator: &str) -> String {
        format!("{}{}{}", self.table, separator, self.column)
    }
}

/// Argument of [`Select::add_column`](super::Select::add_column).
///
/// A bare name belongs to the select's base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnEntry {
    Bare(String),
    Qualified { table: String, column: String },
}

impl From<&str> for ColumnEntry {
    fn from(column: &str) -> Self {
        Self::Bare(column.to_string())
    }
}

impl From<String> for ColumnEntry {
    fn from(column: String) -> Self {
        Self::Bare(column)
    }
}

impl From<&String> for ColumnEntry {
    fn from(column: &String) -> Self {
        Self::Bare(column.clone())
    }
}

impl From<(&str, &str)> for ColumnEntry {
    fn from((table, column): (&str, &str)) -> Self {
        Self::Qualified {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl From<(String, String)> for ColumnEntry {
    fn from((table, column): (String, String)) -> Self {
        Self::Qualified { table, column }
    }
}

impl From<(&Table, &str)> for ColumnEntry {
    fn from((table, column): (&Table, &str)) -> Self {
        Self::Qualified {
            table: table.name().to_string(),
            column: column.to_string(),
        }
    }
}

impl From<ColumnSpec> for ColumnEntry {
    fn from(spec: ColumnSpec) -> Self {
        Self::Qualified {
            table: spec.table,
            column: spec.column,
        }
    }
}
