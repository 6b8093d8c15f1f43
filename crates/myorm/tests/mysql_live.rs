#![cfg(feature = "mysql")]

use myorm::{
    Adapter, AdapterConfig, AdapterKind, AdapterRegistry, ConnectionSettings, LiveMySqlAdapter,
    Model, OrmResult, RetryPolicy, Table, Value, WhereCondition, build_adapter,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn mysql_url(test: &str) -> Option<String> {
    dotenvy::dotenv().ok();
    match std::env::var("MYSQL_URL") {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("MYSQL_URL is not set; skipping {test}");
            None
        }
    }
}

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("{}_{}", std::process::id(), nanos % 1_000_000_000)
}

#[tokio::test]
async fn select_join_roundtrip() -> OrmResult<()> {
    let Some(url) = mysql_url("select_join_roundtrip") else {
        return Ok(());
    };
    let registry = AdapterRegistry::new();
    let adapter = build_adapter(&AdapterConfig::mysql(ConnectionSettings::from_url(&url)?))?;
    registry.register(adapter.clone())?;

    let suffix = unique_suffix();
    let users_name = format!("myorm_users_{suffix}");
    let roles_name = format!("myorm_roles_{suffix}");
    adapter
        .query(
            &format!("CREATE TABLE `{roles_name}` (id INT PRIMARY KEY, name VARCHAR(32) NOT NULL)"),
            &[],
        )
        .await?;
    adapter
        .query(
            &format!(
                "CREATE TABLE `{users_name}` (id INT AUTO_INCREMENT PRIMARY KEY, \
                 name VARCHAR(32) NOT NULL, role_id INT NULL)"
            ),
            &[],
        )
        .await?;
    adapter
        .query(
            &format!("INSERT INTO `{roles_name}` (id, name) VALUES (?, ?)"),
            &[Value::from(1), Value::from("admin")],
        )
        .await?;
    adapter
        .query(
            &format!("INSERT INTO `{users_name}` (name, role_id) VALUES (?, ?), (?, ?)"),
            &[
                Value::from("ada"),
                Value::from(1),
                Value::from("bob"),
                Value::Null,
            ],
        )
        .await?;

    let users = Table::new(users_name.clone())?;
    let roles = Table::new(roles_name.clone())?;

    let columns = users.columns(&registry).await?;
    assert_eq!(columns.len(), 3);
    assert!(columns[0].is_primary_key());
    assert_eq!(columns[0].extra, "auto_increment");

    let mut select = users.select(&registry, None).await?;
    select
        .join_left(
            &roles,
            &format!("`{roles_name}`.`id` = `{users_name}`.`role_id`"),
            None,
        )
        .await?
        .where_([WhereCondition::eq(users_name.as_str(), "name", "ada")])?
        .where_([WhereCondition::eq(users_name.as_str(), "name", "bob")])?;

    let rows = select.fetch().await?;
    assert_eq!(rows.len(), 2);

    let mut seen = Vec::new();
    for row in &rows {
        let data = users.prepare_data_for_model(row)?;
        let user = Model::from_data(&users, &data)?;
        let role = Model::related(&roles, &data);
        let name = user.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        let role_name = role
            .as_ref()
            .and_then(|r| r.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        seen.push((name, role_name));
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("ada".to_string(), Some("admin".to_string())),
            ("bob".to_string(), None),
        ]
    );

    adapter
        .query(&format!("DROP TABLE `{users_name}`, `{roles_name}`"), &[])
        .await?;
    registry.close_all().await?;
    assert!(!adapter.init_done());
    Ok(())
}

#[tokio::test]
async fn unknown_table_is_lookup_error() -> OrmResult<()> {
    let Some(url) = mysql_url("unknown_table_is_lookup_error") else {
        return Ok(());
    };
    let registry = AdapterRegistry::new();
    registry.register(build_adapter(&AdapterConfig::mysql(ConnectionSettings::from_url(&url)?))?)?;

    let ghost = Table::new(format!("myorm_ghost_{}", unique_suffix()))?;
    let err = ghost.columns(&registry).await.unwrap_err();
    assert!(err.is_lookup());
    registry.close_all().await
}

#[tokio::test]
async fn live_query_publishes_changes() -> OrmResult<()> {
    let Some(url) = mysql_url("live_query_publishes_changes") else {
        return Ok(());
    };
    let config = AdapterConfig::new("live", AdapterKind::LiveMysql, ConnectionSettings::from_url(&url)?)
        .poll_interval(Duration::from_millis(50));
    let live = Arc::new(LiveMySqlAdapter::new(&config)?);

    let name = format!("myorm_live_{}", unique_suffix());
    live.query(&format!("CREATE TABLE `{name}` (id INT PRIMARY KEY)"), &[])
        .await?;

    let mut watch = live
        .watch(format!("SELECT COUNT(*) AS n FROM `{name}`"), Vec::new())
        .await?;
    assert_eq!(watch.current()[0].get("n"), Some(&Value::Int(0)));

    live.query(&format!("INSERT INTO `{name}` (id) VALUES (?)"), &[Value::from(1)])
        .await?;
    let rows = tokio::time::timeout(Duration::from_secs(5), watch.changed())
        .await
        .expect("no change published within 5s")?;
    assert_eq!(rows[0].get("n"), Some(&Value::Int(1)));

    drop(watch);
    live.query(&format!("DROP TABLE `{name}`"), &[]).await?;
    live.close().await
}

#[tokio::test]
async fn connection_retries_are_bounded() {
    let config = AdapterConfig::mysql(ConnectionSettings::new("127.0.0.1").port(1))
        .retry(RetryPolicy::new(2, Duration::from_millis(10)));
    let adapter = build_adapter(&config).unwrap();

    let err = adapter.connect().await.unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("2 attempt(s)"));

    let stats = adapter.stats();
    assert_eq!(stats.failed_attempts, 2);
    assert_eq!(stats.connects, 0);
    assert!(!stats.connected);
    assert!(!adapter.init_done());
}
