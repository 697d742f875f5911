//! Gateway to shard over a real gRPC connection, with the shard running on a SQLite file.

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tessera_common::config::{AppConfig, CacheSettings, RouterSettings};
use tessera_common::models::{
    DatabaseConfig, DatabaseProvider, QueryCondition, QueryOperator, QueryTemplate,
    SelectedColumn, SortDirection, StatementKind,
};
use tessera_common::store::{ConfigStore, InMemoryConfigStore, InMemoryTemplateStore, TemplateStore};
use tessera_connectors::DefaultPoolFactory;
use tessera_runtime::{ShardEngine, TemplateCache};
use tessera_server::{serve_shard, FailureKind, Gateway, ShardRouter};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Fixture {
    _dir: TempDir,
    gateway: Gateway,
    config_id: String,
    select_id: String,
    broken_id: String,
    _shutdown: oneshot::Sender<()>,
}

fn router(port: u16) -> Arc<ShardRouter> {
    Arc::new(ShardRouter::new(&RouterSettings {
        host: "127.0.0.1".into(),
        ports: vec![port],
        ..RouterSettings::default()
    }))
}

fn select_open_orders() -> QueryTemplate {
    let mut template = QueryTemplate::new(StatementKind::Select, "orders");
    template.template_name = "open_orders".into();
    template.selected_columns = vec![SelectedColumn::new("id")];
    template.conditions = vec![QueryCondition::new("status", QueryOperator::Equals, "OPEN")];
    template.order_by.insert("id".into(), SortDirection::Asc);
    template
}

async fn seed(engine: &ShardEngine, config: &DatabaseConfig) {
    let mut create = QueryTemplate::new(StatementKind::Create, "orders");
    create.ddl_statement =
        Some("CREATE TABLE orders (id INTEGER PRIMARY KEY, status VARCHAR(20) NOT NULL)".into());
    engine.run_query(&create, config, vec![]).await.unwrap();

    for (id, status) in [(1, "OPEN"), (2, "OPEN"), (3, "SHIPPED")] {
        let mut insert = QueryTemplate::new(StatementKind::Insert, "orders");
        insert.insert_values = serde_json::from_value(json!({"id": id, "status": status})).unwrap();
        engine.run_query(&insert, config, vec![]).await.unwrap();
    }
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let configs = Arc::new(InMemoryConfigStore::new());
    let config = configs
        .save(DatabaseConfig {
            id: String::new(),
            database_connection_name: "shop".into(),
            provider: DatabaseProvider::Sqlite,
            config: serde_json::from_value(json!({
                "url": format!("jdbc:sqlite:{}", dir.path().join("shop.db").display())
            }))
            .unwrap(),
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        })
        .await
        .unwrap();

    let templates = Arc::new(InMemoryTemplateStore::new());
    let select = templates.save(select_open_orders()).await.unwrap();
    let mut broken = select_open_orders();
    broken.template_name = "broken".into();
    broken.sql_query = Some("SELECT id FROM ghosts".into());
    let broken = templates.save(broken).await.unwrap();

    let engine = Arc::new(ShardEngine::new(
        configs.clone(),
        Arc::new(DefaultPoolFactory::default()),
        &AppConfig::default(),
    ));
    seed(&engine, &config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (shutdown, signal) = oneshot::channel::<()>();
    tokio::spawn(serve_shard(engine, listener, async {
        let _ = signal.await;
    }));

    let gateway = Gateway::new(
        Arc::new(TemplateCache::new(templates, &CacheSettings::default())),
        configs,
        router(port),
    );
    Fixture {
        _dir: dir,
        gateway,
        config_id: config.id,
        select_id: select.id,
        broken_id: broken.id,
        _shutdown: shutdown,
    }
}

#[tokio::test]
async fn test_run_query_through_shard() {
    let f = fixture().await;

    let payload = f.gateway.run_query(&f.select_id, &f.config_id, vec![]).await;
    assert!(payload.success, "{:?}", payload.error);
    assert_eq!(payload.data, Some(json!([{"id": 1}, {"id": 2}])));

    let payload = f
        .gateway
        .run_query(
            &f.select_id,
            &f.config_id,
            vec![QueryCondition::new("status", QueryOperator::Equals, "SHIPPED")],
        )
        .await;
    assert_eq!(payload.data, Some(json!([{"id": 3}])));

    // The cached template keeps its own conditions.
    let payload = f.gateway.run_query(&f.select_id, &f.config_id, vec![]).await;
    assert_eq!(payload.data, Some(json!([{"id": 1}, {"id": 2}])));
}

#[tokio::test]
async fn test_unknown_ids_are_request_failures() {
    let f = fixture().await;

    let payload = f.gateway.run_query("no-such-template", &f.config_id, vec![]).await;
    assert!(!payload.success);
    let error = payload.error.unwrap();
    assert_eq!(error.kind, FailureKind::Request);
    assert_eq!(error.code, tessera_error::ErrorCode::TemplateNotFound);

    let payload = f.gateway.run_query(&f.select_id, "no-such-config", vec![]).await;
    assert_eq!(
        payload.error.unwrap().code,
        tessera_error::ErrorCode::ConfigNotFound
    );
}

#[tokio::test]
async fn test_statement_failure_comes_back_from_shard() {
    let f = fixture().await;
    let payload = f.gateway.run_query(&f.broken_id, &f.config_id, vec![]).await;
    assert!(!payload.success);
    let error = payload.error.unwrap();
    assert_eq!(error.kind, FailureKind::Statement);
    assert_eq!(error.code, tessera_error::ErrorCode::StatementFailed);
    assert!(!error.retryable);
}

#[tokio::test]
async fn test_empty_in_override_matches_nothing() {
    let f = fixture().await;
    let payload = f
        .gateway
        .run_query(
            &f.select_id,
            &f.config_id,
            vec![QueryCondition::new("status", QueryOperator::In, "")],
        )
        .await;
    assert_eq!(payload.data, Some(json!([])));
}

#[tokio::test]
async fn test_table_schema_by_table_or_template() {
    let f = fixture().await;

    let payload = f
        .gateway
        .get_table_schema(&f.config_id, Some("orders"), None)
        .await;
    assert!(payload.success, "{:?}", payload.error);
    let data = payload.data.unwrap();
    assert_eq!(data["table"], json!("orders"));
    assert_eq!(data["columns"][1]["name"], json!("status"));
    assert_eq!(data["columns"][1]["type"], json!("VARCHAR(20)"));
    assert_eq!(data["columns"][1]["nullable"], json!(false));

    let payload = f
        .gateway
        .get_table_schema(&f.config_id, None, Some(&f.select_id))
        .await;
    assert_eq!(payload.data.unwrap()["table"], json!("orders"));

    let payload = f.gateway.get_table_schema(&f.config_id, None, None).await;
    let error = payload.error.unwrap();
    assert_eq!(error.code, tessera_error::ErrorCode::BadRequest);
    assert_eq!(error.kind, FailureKind::Request);
}

#[tokio::test]
async fn test_unreachable_shard_is_transport_failure() {
    let free_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let templates = Arc::new(InMemoryTemplateStore::new());
    let select = templates.save(select_open_orders()).await.unwrap();
    let configs = Arc::new(InMemoryConfigStore::new());
    let config = configs
        .save(DatabaseConfig {
            id: String::new(),
            database_connection_name: "remote".into(),
            provider: DatabaseProvider::Sqlite,
            config: serde_json::from_value(json!({"url": "jdbc:sqlite::memory:"})).unwrap(),
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        })
        .await
        .unwrap();

    let gateway = Gateway::new(
        Arc::new(TemplateCache::new(templates, &CacheSettings::default())),
        configs,
        router(free_port),
    );
    let payload = gateway.run_query(&select.id, &config.id, vec![]).await;
    assert!(!payload.success);
    let error = payload.error.unwrap();
    assert_eq!(error.kind, FailureKind::Transport);
    assert!(error.retryable);
}
