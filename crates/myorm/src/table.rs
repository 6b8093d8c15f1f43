//! Table descriptors.

use crate::adapter::{Adapter, ColumnInfo};
use crate::error::{OrmError, OrmResult};
use crate::registry::{AdapterRegistry, DEFAULT_ADAPTER_NAME};
use crate::row::{ModelData, Row, split_row};
use crate::select::{ColumnEntry, Select};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Default separator between table and column in result-column labels.
pub const DEFAULT_COLUMN_SEPARATOR: &str = ".";

/// Names a table and the adapter that serves it.
///
/// The column list is introspected once, on first use, and cached. Clones share the cache.
#[derive(Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

struct TableInner {
    name: String,
    adapter_name: String,
    separator: String,
    columns: OnceCell<Vec<ColumnInfo>>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.inner.name)
            .field("adapter", &self.inner.adapter_name)
            .field("separator", &self.inner.separator)
            .field("columns_cached", &self.inner.columns.initialized())
            .finish()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name && self.inner.adapter_name == other.inner.adapter_name
    }
}

impl Eq for Table {}

/// Lets a `&Table` stand in wherever a table name is expected.
impl From<&Table> for String {
    fn from(table: &Table) -> Self {
        table.name().to_string()
    }
}

impl Table {
    /// A table served by the default (`"mysql"`) adapter.
    pub fn new(name: impl Into<String>) -> OrmResult<Self> {
        Self::build(name.into(), DEFAULT_ADAPTER_NAME.to_string(), DEFAULT_COLUMN_SEPARATOR.to_string())
    }

    /// A table served by the adapter registered under `adapter`.
    pub fn with_adapter(name: impl Into<String>, adapter: impl Into<String>) -> OrmResult<Self> {
        Self::build(name.into(), adapter.into(), DEFAULT_COLUMN_SEPARATOR.to_string())
    }

    /// Use a different table/column separator for result-column labels.
    ///
    /// Returns a new descriptor with its own (empty) column cache.
    pub fn with_separator(&self, separator: impl Into<String>) -> OrmResult<Self> {
        Self::build(
            self.inner.name.clone(),
            self.inner.adapter_name.clone(),
            separator.into(),
        )
    }

    fn build(name: String, adapter_name: String, separator: String) -> OrmResult<Self> {
        if name.trim().is_empty() {
            return Err(OrmError::configuration("you have to define a name for your table"));
        }
        if adapter_name.trim().is_empty() {
            return Err(OrmError::configuration(format!(
                "table \"{name}\": adapter name must not be empty"
            )));
        }
        if separator.is_empty() {
            return Err(OrmError::configuration(format!(
                "table \"{name}\": column separator must not be empty"
            )));
        }
        Ok(Self {
            inner: Arc::new(TableInner {
                name,
                adapter_name,
                separator,
                columns: OnceCell::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn adapter_name(&self) -> &str {
        &self.inner.adapter_name
    }

    pub fn separator(&self) -> &str {
        &self.inner.separator
    }

    /// Result-column label for one of this table's columns.
    pub fn alias(&self, column: &str) -> String {
        format!("{}{}{}", self.inner.name, self.inner.separator, column)
    }

    /// Resolve this table's adapter.
    pub fn adapter(&self, registry: &AdapterRegistry) -> OrmResult<Arc<dyn Adapter>> {
        if !registry.has_adapter(self.adapter_name()) {
            return Err(OrmError::lookup(format!(
                "no adapter \"{}\" for table \"{}\" found",
                self.adapter_name(),
                self.name()
            )));
        }
        registry.get_adapter(self.adapter_name())
    }

    /// Column metadata, introspected through the table's adapter on first call.
    pub async fn columns(&self, registry: &AdapterRegistry) -> OrmResult<&[ColumnInfo]> {
        let adapter = self.adapter(registry)?;
        self.columns_from(adapter.as_ref()).await
    }

    /// Like [`columns`](Self::columns) with an already resolved adapter.
    pub async fn columns_from<A: Adapter + ?Sized>(&self, adapter: &A) -> OrmResult<&[ColumnInfo]> {
        let columns = self
            .inner
            .columns
            .get_or_try_init(|| async {
                tracing::debug!(
                    target: "myorm.adapter",
                    adapter = %adapter.name(),
                    table = %self.name(),
                    "introspecting columns"
                );
                adapter.columns_of_table(self).await
            })
            .await?;
        Ok(columns.as_slice())
    }

    /// Column names, in table order.
    pub async fn column_names(&self, registry: &AdapterRegistry) -> OrmResult<Vec<String>> {
        Ok(self
            .columns(registry)
            .await?
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    /// Cached column metadata, if already introspected.
    pub fn cached_columns(&self) -> Option<&[ColumnInfo]> {
        self.inner.columns.get().map(Vec::as_slice)
    }

    /// Split a flat result row into per-table attribute groups using this table's separator.
    pub fn prepare_data_for_model(&self, row: &Row) -> OrmResult<ModelData> {
        split_row(row, self.separator())
    }

    /// Start a SELECT on this table through its adapter.
    pub async fn select(
        &self,
        registry: &AdapterRegistry,
        columns: Option<Vec<ColumnEntry>>,
    ) -> OrmResult<Select> {
        let adapter = self.adapter(registry)?;
        adapter.select(registry, self, columns).await
    }
}
