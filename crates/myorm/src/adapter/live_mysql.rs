//! MySQL backend with live (re-polled) result sets.

use super::{Adapter, ColumnInfo, ConnectionStats, MySqlAdapter};
use crate::config::{AdapterConfig, ConnectionSettings};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::select::Select;
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// MySQL adapter that can keep a query's result set up to date.
///
/// Plain `query()` calls behave exactly like [`MySqlAdapter`]. [`watch`](Self::watch) runs a
/// statement once and then re-runs it every `poll_interval`, publishing the rows whenever
/// they differ from the last published set.
pub struct LiveMySqlAdapter {
    inner: MySqlAdapter,
    poll_interval: Duration,
}

impl LiveMySqlAdapter {
    pub fn new(config: &AdapterConfig) -> OrmResult<Self> {
        if config.poll_interval.is_zero() {
            return Err(OrmError::configuration(format!(
                "adapter \"{}\": poll interval must be greater than zero",
                config.name
            )));
        }
        Ok(Self {
            inner: MySqlAdapter::new(config)?,
            poll_interval: config.poll_interval,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `sql` and keep its result set current.
    ///
    /// The first result is fetched before returning, so an invalid statement fails here.
    /// Polling stops when the returned [`LiveQuery`] is dropped or the adapter goes away.
    pub async fn watch(self: &Arc<Self>, sql: impl Into<String>, params: Vec<Value>) -> OrmResult<LiveQuery> {
        let sql = sql.into();
        let initial = self.query(&sql, &params).await?;
        let adapter: Weak<Self> = Arc::downgrade(self);

        tracing::debug!(
            target: "myorm.adapter",
            adapter = %self.name(),
            interval = ?self.poll_interval,
            "starting live query"
        );

        Ok(LiveQuery::spawn(initial, self.poll_interval, move || {
            let adapter = adapter.upgrade();
            let sql = sql.clone();
            let params = params.clone();
            async move {
                let adapter = adapter?;
                Some(adapter.query(&sql, &params).await)
            }
        }))
    }

    /// Watch the statement a [`Select`] renders.
    pub async fn watch_select(self: &Arc<Self>, select: &Select) -> OrmResult<LiveQuery> {
        let sql = select.build()?;
        self.watch(sql, Vec::new()).await
    }
}

#[async_trait]
impl Adapter for LiveMySqlAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn settings(&self) -> &ConnectionSettings {
        self.inner.settings()
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        self.inner.dialect()
    }

    fn init_done(&self) -> bool {
        self.inner.init_done()
    }

    fn stats(&self) -> ConnectionStats {
        self.inner.stats()
    }

    async fn open(&self) -> OrmResult<()> {
        self.inner.open().await
    }

    async fn connect(&self) -> OrmResult<()> {
        self.inner.connect().await
    }

    async fn close(&self) -> OrmResult<()> {
        self.inner.close().await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.inner.query(sql, params).await
    }

    async fn columns_of_table(&self, table: &Table) -> OrmResult<Vec<ColumnInfo>> {
        self.inner.columns_of_table(table).await
    }
}

/// Handle to a polled result set.
///
/// Dropping the handle stops polling.
pub struct LiveQuery {
    rx: watch::Receiver<Arc<Vec<Row>>>,
    task: JoinHandle<()>,
}

impl LiveQuery {
    /// Publish `initial`, then call `fetch` every `interval`.
    ///
    /// `fetch` returning `None` ends polling; failed polls are logged and skipped.
    pub(crate) fn spawn<F, Fut>(initial: Vec<Row>, interval: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<OrmResult<Vec<Row>>>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(Arc::new(initial));
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if tx.is_closed() {
                    break;
                }
                match fetch().await {
                    None => break,
                    Some(Ok(rows)) => {
                        tx.send_if_modified(|current| {
                            if **current == rows {
                                return false;
                            }
                            *current = Arc::new(rows);
                            true
                        });
                    }
                    Some(Err(err)) => {
                        tracing::warn!(target: "myorm.adapter", error = %err, "live query poll failed");
                    }
                }
            }
        });
        Self { rx, task }
    }

    /// The latest published result set.
    pub fn current(&self) -> Arc<Vec<Row>> {
        self.rx.borrow().clone()
    }

    /// Wait until a different result set is published.
    pub async fn changed(&mut self) -> OrmResult<Arc<Vec<Row>>> {
        self.rx
            .changed()
            .await
            .map_err(|_| OrmError::Other("live query stopped".to_string()))?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// An independent receiver, e.g. for another task.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Row>>> {
        self.rx.clone()
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        self.task.abort();
    }
}
