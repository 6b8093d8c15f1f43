//! Flat result rows and their per-table split.
//!
//! A [`Select`](crate::Select) labels every projected column `<table><sep><column>`, so a flat
//! result row can be split back into one attribute group per table with [`split_row`].

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::collections::BTreeMap;

/// Column-name → value mapping for one table slice of a row.
pub type Attributes = BTreeMap<String, Value>;

/// A flat result row, keyed by result-column label, in driver column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from parallel column/value vectors.
    ///
    /// Extra entries on the longer side are ignored.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        let len = columns.len().min(values.len());
        let mut columns = columns;
        let mut values = values;
        columns.truncate(len);
        values.truncate(len);
        Self { columns, values }
    }

    /// Append a column. A repeated label replaces the earlier value.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    /// Value of a column by label.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Column labels in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate `(label, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::default();
        for (k, v) in iter {
            row.push(k, v);
        }
        row
    }
}

/// A row split into table name → [`Attributes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    tables: BTreeMap<String, Attributes>,
}

impl ModelData {
    /// Attributes of one table, if the row carried any column of it.
    pub fn get(&self, table: &str) -> Option<&Attributes> {
        self.tables.get(table)
    }

    /// Remove and return the attributes of one table.
    pub fn take(&mut self, table: &str) -> Option<Attributes> {
        self.tables.remove(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Table names present in the row, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, Attributes> {
        self.tables
    }
}

/// Split one alias key on the last occurrence of `separator`.
///
/// Returns `(table, column)`; both sides must be non-empty.
pub fn split_alias<'a>(key: &'a str, separator: &str) -> OrmResult<(&'a str, &'a str)> {
    if separator.is_empty() {
        return Err(OrmError::mapping("column separator must not be empty"));
    }
    match key.rsplit_once(separator) {
        Some((table, column)) if !table.is_empty() && !column.is_empty() => Ok((table, column)),
        _ => Err(OrmError::mapping(format!(
            "malformed row key '{key}', expected <table>{separator}<column>"
        ))),
    }
}

/// Split a flat aliased row into per-table attribute groups.
///
/// Every key must contain `separator`; the text after its last occurrence is the column,
/// the text before it is the table.
pub fn split_row(row: &Row, separator: &str) -> OrmResult<ModelData> {
    let mut data = ModelData::default();
    for (key, value) in row.iter() {
        let (table, column) = split_alias(key, separator)?;
        data.tables
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), value.clone());
    }
    Ok(data)
}
