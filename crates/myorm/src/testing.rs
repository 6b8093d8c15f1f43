//! In-memory adapter for offline tests.

use crate::adapter::{Adapter, ColumnInfo, ConnectionStats};
use crate::config::ConnectionSettings;
use crate::dialect::{Dialect, MySqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Adapter with fixed column lists and canned result rows. Records every statement.
pub(crate) struct StubAdapter {
    name: String,
    settings: ConnectionSettings,
    tables: HashMap<String, Vec<String>>,
    rows: Vec<Row>,
    queries: Mutex<Vec<String>>,
    introspections: AtomicUsize,
    connected: AtomicBool,
}

impl StubAdapter {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            settings: ConnectionSettings::new("stub"),
            tables: HashMap::new(),
            rows: Vec::new(),
            queries: Mutex::new(Vec::new()),
            introspections: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
        }
    }

    pub(crate) fn arc(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub(crate) fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub(crate) fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(MySqlDialect)
    }

    fn init_done(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connected: self.init_done(),
            ..ConnectionStats::default()
        }
    }

    async fn open(&self) -> OrmResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self) -> OrmResult<()> {
        self.open().await
    }

    async fn close(&self) -> OrmResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> OrmResult<Vec<Row>> {
        self.connected.store(true, Ordering::SeqCst);
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self.rows.clone())
    }

    async fn columns_of_table(&self, table: &Table) -> OrmResult<Vec<ColumnInfo>> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(table.name())
            .map(|cols| cols.iter().map(ColumnInfo::named).collect())
            .ok_or_else(|| OrmError::lookup(format!("table \"{}\" has no columns", table.name())))
    }
}
