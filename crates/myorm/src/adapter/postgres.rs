//! PostgreSQL backend (tokio-postgres).

use super::{
    Adapter, ColumnInfo, ConnectionSlot, ConnectionStats, columns_from_rows, log_sql, with_timeout,
};
use crate::config::{AdapterConfig, ConnectionSettings};
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::table::Table;
use crate::value::Value;
use async_trait::async_trait;
use bytes::BytesMut;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};

const COLUMNS_SQL: &str = r#"SELECT c.column_name::text AS "COLUMN_NAME",
       c.data_type::text AS "COLUMN_TYPE",
       c.is_nullable::text AS "IS_NULLABLE",
       CASE WHEN EXISTS (
           SELECT 1
           FROM information_schema.table_constraints tc
           JOIN information_schema.key_column_usage k
             ON k.constraint_name = tc.constraint_name AND k.table_schema = tc.table_schema
           WHERE tc.constraint_type = 'PRIMARY KEY'
             AND k.table_schema = c.table_schema
             AND k.table_name = c.table_name
             AND k.column_name = c.column_name
       ) THEN 'PRI' ELSE '' END AS "COLUMN_KEY",
       c.column_default::text AS "COLUMN_DEFAULT",
       CASE WHEN c.is_identity = 'YES' THEN 'identity' ELSE '' END AS "EXTRA"
FROM information_schema.columns c
WHERE c.table_schema = current_schema() AND c.table_name = $1
ORDER BY c.ordinal_position"#;

/// PostgreSQL adapter backed by a single `tokio_postgres::Client`.
pub struct PostgresAdapter {
    name: String,
    settings: ConnectionSettings,
    query_timeout: Option<Duration>,
    slot: ConnectionSlot<Client>,
}

impl PostgresAdapter {
    pub fn new(config: &AdapterConfig) -> OrmResult<Self> {
        let settings = config.require_settings()?.clone();
        Ok(Self {
            name: config.name.clone(),
            settings,
            query_timeout: config.query_timeout,
            slot: ConnectionSlot::new(config.name.clone(), config.retry),
        })
    }

    async fn open_client(&self) -> OrmResult<Client> {
        let url = self.settings.to_url("postgres")?;
        let (client, connection) = tokio_postgres::connect(&url, NoTls)
            .await
            .map_err(|e| OrmError::connection(format!("failed to connect to PostgreSQL: {e}")))?;

        let adapter = self.name.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target: "myorm.adapter", adapter = %adapter, error = %e, "connection task ended");
            }
        });

        for statement in &self.settings.init_statements {
            client.batch_execute(statement).await?;
        }
        Ok(client)
    }

    async fn run(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        log_sql(&self.name, sql, params.len());
        let client = self.slot.acquire(|| self.open_client()).await?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows = client.query(sql, &refs).await?;
        rows.iter().map(from_pg_row).collect()
    }
}

async fn release(client: Client) -> OrmResult<()> {
    // Dropping the client ends the spawned connection task.
    drop(client);
    Ok(())
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(PostgresDialect)
    }

    fn init_done(&self) -> bool {
        self.slot.init_done()
    }

    fn stats(&self) -> ConnectionStats {
        self.slot.stats()
    }

    async fn open(&self) -> OrmResult<()> {
        self.slot.reopen(|| self.open_client(), release).await
    }

    async fn connect(&self) -> OrmResult<()> {
        self.slot.acquire(|| self.open_client()).await.map(drop)
    }

    async fn close(&self) -> OrmResult<()> {
        self.slot.close(release).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        with_timeout(self.query_timeout, self.run(sql, params)).await
    }

    async fn columns_of_table(&self, table: &Table) -> OrmResult<Vec<ColumnInfo>> {
        let rows = self.query(COLUMNS_SQL, &[Value::from(table.name())]).await?;
        columns_from_rows(&rows, table.name())
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(n) => int_to_sql(*n, ty, out),
            Value::UInt(n) => int_to_sql(i64::try_from(*n)?, ty, out),
            Value::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql(ty, out),
            Value::Float(f) => f.to_sql(ty, out),
            Value::String(s) => s.as_str().to_sql(ty, out),
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Date(d) => d.to_sql(ty, out),
            Value::Time(t) => t.to_sql(ty, out),
            Value::DateTime(dt) => dt.to_sql(ty, out),
            Value::Json(j) => j.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn int_to_sql(n: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(n)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(n)?.to_sql(ty, out),
        Type::FLOAT8 => (n as f64).to_sql(ty, out),
        _ => n.to_sql(ty, out),
    }
}

fn from_pg_row(row: &tokio_postgres::Row) -> OrmResult<Row> {
    let mut out = Row::default();
    for (idx, column) in row.columns().iter().enumerate() {
        out.push(column.name(), pg_value(row, idx, column.type_())?);
    }
    Ok(out)
}

fn pg_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> OrmResult<Value> {
    fn get<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> OrmResult<Value>
    where
        T: tokio_postgres::types::FromSql<'a> + Into<Value>,
    {
        row.try_get::<_, Option<T>>(idx)
            .map(Value::from)
            .map_err(|e| OrmError::mapping(format!("column {idx}: {e}")))
    }

    match *ty {
        Type::BOOL => get::<bool>(row, idx),
        Type::INT2 => get::<i16>(row, idx),
        Type::INT4 => get::<i32>(row, idx),
        Type::INT8 => get::<i64>(row, idx),
        Type::OID => get::<u32>(row, idx),
        Type::FLOAT4 => get::<f32>(row, idx),
        Type::FLOAT8 => get::<f64>(row, idx),
        Type::BYTEA => get::<Vec<u8>>(row, idx),
        Type::DATE => get::<chrono::NaiveDate>(row, idx),
        Type::TIME => get::<chrono::NaiveTime>(row, idx),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map(|v| Value::from(v.map(|dt| dt.naive_utc())))
            .map_err(|e| OrmError::mapping(format!("column {idx}: {e}"))),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx),
        _ => get::<String>(row, idx)
            .map_err(|_| OrmError::mapping(format!("column {idx}: unsupported PostgreSQL type {ty}"))),
    }
}
