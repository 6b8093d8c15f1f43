//! Database adapters.
//!
//! An [`Adapter`] owns one lazily opened connection to one backend and knows how to escape
//! values and identifiers for it. Concrete backends:
//!
//! - [`MySqlAdapter`]: standard MySQL client.
//! - [`LiveMySqlAdapter`]: MySQL client that can also keep a query's result set up to date.
//! - [`PostgresAdapter`] (feature `postgres`).
//!
//! All statement execution is async; a caller never observes a partially collected result.

mod connection;
#[cfg(feature = "mysql")]
mod live_mysql;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;

pub use connection::{ConnectionSlot, ConnectionStats};
#[cfg(feature = "mysql")]
pub use live_mysql::{LiveMySqlAdapter, LiveQuery};
#[cfg(feature = "mysql")]
pub use mysql::MySqlAdapter;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAdapter;

use crate::config::{AdapterConfig, AdapterKind, ConnectionSettings};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::registry::AdapterRegistry;
use crate::row::Row;
use crate::select::{ColumnEntry, Select};
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Backend type, e.g. `int(11)` or `character varying`.
    pub column_type: String,
    pub nullable: bool,
    /// Index membership (`PRI`, `UNI`, `MUL`), empty when none.
    pub key: String,
    pub default: Option<String>,
    /// Extra attributes such as `auto_increment`.
    pub extra: String,
}

impl ColumnInfo {
    /// A nullable column with unknown type; handy for fixtures.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: String::new(),
            nullable: true,
            key: String::new(),
            default: None,
            extra: String::new(),
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.key == "PRI"
    }
}

/// Capability contract of one database backend.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry key of this adapter.
    fn name(&self) -> &str;

    /// The settings this adapter connects with.
    fn settings(&self) -> &ConnectionSettings;

    /// Escaping rules used for every statement this adapter renders.
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Whether post-open initialization has completed for the current connection.
    fn init_done(&self) -> bool;

    /// Connection lifecycle counters.
    fn stats(&self) -> ConnectionStats;

    /// Open a fresh connection, replacing (and closing) any existing one.
    async fn open(&self) -> OrmResult<()>;

    /// Make sure a connection exists, opening one on first use.
    async fn connect(&self) -> OrmResult<()>;

    /// Release the connection. Safe to call when nothing is open.
    async fn close(&self) -> OrmResult<()>;

    /// Execute a statement and collect every row.
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Column metadata of a table, in table order.
    async fn columns_of_table(&self, table: &Table) -> OrmResult<Vec<ColumnInfo>>;

    /// Quote a literal value.
    fn escape(&self, value: &Value) -> String {
        self.dialect().escape(value)
    }

    /// Quote an identifier.
    fn escape_identifier(&self, name: &str) -> String {
        self.dialect().escape_identifier(name)
    }

    /// Start a SELECT on `table`.
    ///
    /// Without `columns`, every column of `table` is projected (fetched once through the
    /// table's column cache).
    async fn select(
        &self,
        registry: &AdapterRegistry,
        table: &Table,
        columns: Option<Vec<ColumnEntry>>,
    ) -> OrmResult<Select> {
        let mut select = Select::new(registry.clone(), table.clone(), self.dialect());
        match columns {
            Some(columns) => {
                select.set_columns(columns)?;
            }
            None => {
                let names: Vec<String> = table
                    .columns_from(self)
                    .await?
                    .iter()
                    .map(|c| c.name.clone())
                    .collect();
                for name in names {
                    select.add_column(name)?;
                }
            }
        }
        Ok(select)
    }
}

/// Build the backend named by `config.kind`.
pub fn build_adapter(config: &AdapterConfig) -> OrmResult<Arc<dyn Adapter>> {
    match config.kind {
        #[cfg(feature = "mysql")]
        AdapterKind::Mysql => Ok(Arc::new(MySqlAdapter::new(config)?)),
        #[cfg(feature = "mysql")]
        AdapterKind::LiveMysql => Ok(Arc::new(LiveMySqlAdapter::new(config)?)),
        #[cfg(feature = "postgres")]
        AdapterKind::Postgres => Ok(Arc::new(PostgresAdapter::new(config)?)),
        #[allow(unreachable_patterns)]
        kind => Err(OrmError::configuration(format!(
            "adapter \"{}\": backend {kind:?} is not compiled in (enable its cargo feature)",
            config.name
        ))),
    }
}

/// Run `fut`, bounded by `timeout` when one is configured.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> OrmResult<T>
where
    F: std::future::Future<Output = OrmResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| OrmError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Log a statement right before it is sent.
pub(crate) fn log_sql(adapter: &str, sql: &str, params: usize) {
    tracing::debug!(target: "myorm.sql", adapter, params, sql, "executing statement");
}

/// Turn introspection rows labelled like `INFORMATION_SCHEMA.COLUMNS` into [`ColumnInfo`]s.
pub(crate) fn columns_from_rows(rows: &[Row], table: &str) -> OrmResult<Vec<ColumnInfo>> {
    if rows.is_empty() {
        return Err(OrmError::lookup(format!(
            "table \"{table}\" has no columns (does it exist?)"
        )));
    }
    let text = |row: &Row, col: &str| -> Option<String> {
        row.get(col).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Value::Null => None,
            other => Some(other.to_json().to_string()),
        })
    };
    rows.iter()
        .map(|row| {
            let name = text(row, "COLUMN_NAME").ok_or_else(|| {
                OrmError::mapping(format!("column introspection of \"{table}\" returned no COLUMN_NAME"))
            })?;
            Ok(ColumnInfo {
                name,
                column_type: text(row, "COLUMN_TYPE").unwrap_or_default(),
                nullable: text(row, "IS_NULLABLE").is_some_and(|v| v == "YES"),
                key: text(row, "COLUMN_KEY").unwrap_or_default(),
                default: text(row, "COLUMN_DEFAULT"),
                extra: text(row, "EXTRA").unwrap_or_default(),
            })
        })
        .collect()
}
