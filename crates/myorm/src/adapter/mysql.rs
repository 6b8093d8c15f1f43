//! Standard MySQL backend (mysql_async).

use super::{
    Adapter, ColumnInfo, ConnectionSlot, ConnectionStats, columns_from_rows, log_sql, with_timeout,
};
use crate::config::{AdapterConfig, ConnectionSettings};
use crate::dialect::{Dialect, MySqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params};
use std::sync::Arc;
use std::time::Duration;

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, \
     COLUMN_DEFAULT, EXTRA FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

/// MySQL adapter backed by a single `mysql_async` connection.
pub struct MySqlAdapter {
    name: String,
    settings: ConnectionSettings,
    query_timeout: Option<Duration>,
    slot: ConnectionSlot<Conn>,
}

impl MySqlAdapter {
    /// Build an adapter from configuration. No connection is opened yet.
    pub fn new(config: &AdapterConfig) -> OrmResult<Self> {
        let settings = config.require_settings()?.clone();
        Ok(Self {
            name: config.name.clone(),
            settings,
            query_timeout: config.query_timeout,
            slot: ConnectionSlot::new(config.name.clone(), config.retry),
        })
    }

    fn opts(&self) -> Opts {
        let s = &self.settings;
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(s.host.clone())
            .user(s.user.clone())
            .pass(s.password.clone())
            .db_name(s.database.clone())
            .init(s.init_statements.clone());
        if let Some(port) = s.port {
            builder = builder.tcp_port(port);
        }
        builder.into()
    }

    async fn open_conn(&self) -> OrmResult<Conn> {
        Conn::new(self.opts())
            .await
            .map_err(|e| OrmError::connection(format!("failed to connect to MySQL: {e}")))
    }

    /// Lock the connection, opening it on first use.
    ///
    /// The guard serializes every other use of this adapter until it is dropped.
    pub async fn connection(&self) -> OrmResult<tokio::sync::MappedMutexGuard<'_, Conn>> {
        self.slot.acquire(|| self.open_conn()).await
    }

    /// Check the connection with a round trip.
    pub async fn ping(&self) -> OrmResult<()> {
        let mut conn = self.connection().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn run(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        log_sql(&self.name, sql, params.len());
        let mut conn = self.connection().await?;
        let params = to_params(params);
        let rows: Vec<mysql_async::Row> = conn.exec(sql, params).await?;
        Ok(rows.into_iter().map(from_mysql_row).collect())
    }
}

#[async_trait]
impl Adapter for MySqlAdapter {
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
        self.slot.init_done()
    }

    fn stats(&self) -> ConnectionStats {
        self.slot.stats()
    }

    async fn open(&self) -> OrmResult<()> {
        self.slot
            .reopen(|| self.open_conn(), disconnect)
            .await
    }

    async fn connect(&self) -> OrmResult<()> {
        self.connection().await.map(drop)
    }

    async fn close(&self) -> OrmResult<()> {
        self.slot.close(disconnect).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        with_timeout(self.query_timeout, self.run(sql, params)).await
    }

    async fn columns_of_table(&self, table: &Table) -> OrmResult<Vec<ColumnInfo>> {
        let rows = self.query(COLUMNS_SQL, &[Value::from(table.name())]).await?;
        columns_from_rows(&rows, table.name())
    }
}

pub(super) async fn disconnect(conn: Conn) -> OrmResult<()> {
    conn.disconnect()
        .await
        .map_err(|e| OrmError::connection(format!("failed to close connection: {e}")))
}

pub(super) fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(params.iter().map(to_mysql_value).collect())
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    use chrono::{Datelike, Timelike};
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Int(n) => mysql_async::Value::Int(*n),
        Value::UInt(n) => mysql_async::Value::UInt(*n),
        Value::Float(f) => mysql_async::Value::Double(*f),
        Value::String(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
        Value::Date(d) => {
            mysql_async::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => mysql_async::Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1000,
        ),
        Value::Json(j) => mysql_async::Value::Bytes(j.to_string().into_bytes()),
    }
}

fn from_mysql_value(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::String(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(n) => Value::Int(n),
        mysql_async::Value::UInt(n) => Value::UInt(n),
        mysql_async::Value::Float(f) => Value::Float(f64::from(f)),
        mysql_async::Value::Double(d) => Value::Float(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into()) else {
                // Zero dates ('0000-00-00') have no chrono representation.
                return Value::Null;
            };
            if hour == 0 && min == 0 && sec == 0 && micro == 0 {
                return Value::Date(date);
            }
            NaiveTime::from_hms_micro_opt(hour.into(), min.into(), sec.into(), micro)
                .map(|time| Value::DateTime(NaiveDateTime::new(date, time)))
                .unwrap_or(Value::Null)
        }
        mysql_async::Value::Time(negative, days, hour, min, sec, micro) => {
            if negative || days > 0 {
                // Durations outside one day are kept in their textual form.
                let sign = if negative { "-" } else { "" };
                let hours = days * 24 + u32::from(hour);
                return Value::String(format!("{sign}{hours:02}:{min:02}:{sec:02}.{micro:06}"));
            }
            NaiveTime::from_hms_micro_opt(hour.into(), min.into(), sec.into(), micro)
                .map(Value::Time)
                .unwrap_or(Value::Null)
        }
    }
}

pub(super) fn from_mysql_row(row: mysql_async::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    let values: Vec<Value> = (0..row.len())
        .map(|i| {
            let val: mysql_async::Value = row.get(i).unwrap_or(mysql_async::Value::NULL);
            from_mysql_value(val)
        })
        .collect();
    Row::new(columns, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdapterKind, RetryPolicy};

    fn config() -> AdapterConfig {
        AdapterConfig::new(
            "mysql",
            AdapterKind::Mysql,
            ConnectionSettings::new("127.0.0.1").port(1).database("none"),
        )
        .retry(RetryPolicy::no_retry())
    }

    #[test]
    fn construction_needs_settings() {
        let mut cfg = config();
        cfg.settings = None;
        assert!(MySqlAdapter::new(&cfg).is_err_and(|e| e.is_configuration()));
    }

    #[test]
    fn nothing_is_opened_on_construction() {
        let adapter = MySqlAdapter::new(&config()).unwrap();
        assert!(!adapter.init_done());
        assert_eq!(adapter.stats(), ConnectionStats::default());
        assert_eq!(adapter.escape_identifier("users"), "`users`");
    }

    #[tokio::test]
    async fn close_without_connection_is_ok() {
        let adapter = MySqlAdapter::new(&config()).unwrap();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();
        assert_eq!(adapter.stats().closes, 0);
    }

    #[test]
    fn values_convert_back_and_forth() {
        assert_eq!(from_mysql_value(mysql_async::Value::NULL), Value::Null);
        assert_eq!(from_mysql_value(mysql_async::Value::Int(-3)), Value::Int(-3));
        assert_eq!(
            from_mysql_value(mysql_async::Value::Bytes(b"abc".to_vec())),
            Value::String("abc".into())
        );
        assert_eq!(
            from_mysql_value(mysql_async::Value::Bytes(vec![0xff, 0xfe])),
            Value::Bytes(vec![0xff, 0xfe])
        );
        let date = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        assert_eq!(
            from_mysql_value(mysql_async::Value::Date(2023, 5, 1, 0, 0, 0, 0)),
            Value::Date(date)
        );
        assert_eq!(from_mysql_value(mysql_async::Value::Date(0, 0, 0, 0, 0, 0, 0)), Value::Null);
        assert!(matches!(to_params(&[]), Params::Empty));
        assert_eq!(to_mysql_value(&Value::Date(date)), mysql_async::Value::Date(2023, 5, 1, 0, 0, 0, 0));
    }

    #[test]
    fn introspection_rows_become_column_info() {
        let rows = vec![
            [
                ("COLUMN_NAME", Value::from("id")),
                ("COLUMN_TYPE", Value::from("int(11)")),
                ("IS_NULLABLE", Value::from("NO")),
                ("COLUMN_KEY", Value::from("PRI")),
                ("COLUMN_DEFAULT", Value::Null),
                ("EXTRA", Value::from("auto_increment")),
            ]
            .into_iter()
            .collect::<Row>(),
            [("COLUMN_NAME", Value::from("name")), ("IS_NULLABLE", Value::from("YES"))]
                .into_iter()
                .collect::<Row>(),
        ];
        let cols = columns_from_rows(&rows, "users").unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols[0].is_primary_key());
        assert!(!cols[0].nullable);
        assert_eq!(cols[0].extra, "auto_increment");
        assert_eq!(cols[1].name, "name");
        assert!(cols[1].nullable);

        assert!(columns_from_rows(&[], "ghost").unwrap_err().is_lookup());
    }
}
