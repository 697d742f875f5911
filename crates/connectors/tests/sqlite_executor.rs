use serde_json::json;
use tempfile::TempDir;
use tessera_common::models::{DatabaseConfig, DatabaseProvider};
use tessera_connectors::{DefaultPoolFactory, Pool, PoolFactory};
use tessera_error::ErrorCode;
use tessera_sql::{BoundStatement, SqlType, SqlValue};

async fn sqlite_pool(dir: &TempDir) -> Pool {
    let path = dir.path().join("shop.db");
    let config = DatabaseConfig {
        id: "local".into(),
        database_connection_name: "shop".into(),
        provider: DatabaseProvider::Sqlite,
        config: serde_json::from_value(json!({
            "url": format!("jdbc:sqlite:{}", path.display()),
            "maxPoolSize": 2
        }))
        .unwrap(),
        active: true,
        fallback_config_id: None,
        privacy_fallback_config: None,
        created_at: None,
        updated_at: None,
    };
    DefaultPoolFactory::default().build(&config).await.unwrap()
}

async fn seed(pool: &Pool) {
    pool.execute_ddl(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, status VARCHAR(20) NOT NULL, total NUMERIC(10,2))",
    )
    .await
    .unwrap();
    for (id, status, total) in [(1, "OPEN", "10.50"), (2, "SHIPPED", "99.00"), (3, "OPEN", "4.25")] {
        let mut stmt = BoundStatement::new();
        stmt.push_sql("INSERT INTO orders (id, status, total) VALUES (");
        stmt.bind("id", SqlValue::Int(id));
        stmt.push_sql(", ");
        stmt.bind("status", SqlValue::Text(status.into()));
        stmt.push_sql(", ");
        stmt.bind("total", SqlValue::Decimal(total.parse().unwrap()));
        stmt.push_sql(")");
        assert_eq!(pool.execute(&stmt).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_bound_query_round_trip() {
    let dir = TempDir::new().unwrap();
    let pool = sqlite_pool(&dir).await;
    seed(&pool).await;

    let mut stmt = BoundStatement::new();
    stmt.push_sql("SELECT id, status FROM orders WHERE status = ");
    stmt.bind("status", SqlValue::Text("OPEN".into()));
    stmt.push_sql(" AND id IN (");
    stmt.bind("ids", SqlValue::List(vec![SqlValue::BigInt(1), SqlValue::BigInt(2), SqlValue::BigInt(3)]));
    stmt.push_sql(") ORDER BY id");

    let rows = pool.query(&stmt).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], json!(1));
    assert_eq!(rows[1]["status"], json!("OPEN"));
}

#[tokio::test]
async fn test_update_reports_affected_rows() {
    let dir = TempDir::new().unwrap();
    let pool = sqlite_pool(&dir).await;
    seed(&pool).await;

    let mut stmt = BoundStatement::new();
    stmt.push_sql("UPDATE orders SET status = ");
    stmt.bind("status", SqlValue::Text("CLOSED".into()));
    stmt.push_sql(" WHERE status = ");
    stmt.bind("status", SqlValue::Text("OPEN".into()));
    assert_eq!(pool.execute(&stmt).await.unwrap(), 2);
}

#[tokio::test]
async fn test_describe_and_column_types() {
    let dir = TempDir::new().unwrap();
    let pool = sqlite_pool(&dir).await;
    seed(&pool).await;

    let columns = pool.describe_table("orders").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "status", "total"]);
    assert!(!columns[1].nullable);
    assert_eq!(columns[1].size, Some(20));

    let types = pool.column_types("ORDERS").await.unwrap();
    assert_eq!(types.get("id"), Some(&SqlType::Integer));
    assert_eq!(types.get("total"), Some(&SqlType::Decimal));

    assert!(pool.describe_table("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_statement_errors_carry_code() {
    let dir = TempDir::new().unwrap();
    let pool = sqlite_pool(&dir).await;

    let err = pool
        .query(&BoundStatement::raw("SELECT * FROM nowhere"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::StatementFailed);
    assert!(pool.ping().await.is_ok());
}
