//! Tessera Server: the RPC and routing layer.
//!
//! - **Shard**: [`ShardServer`] serves `tessera.Shard` (RunQuery, GetTableSchema) over
//!   gRPC with a JSON codec, backed by one [`ShardEngine`].
//! - **Gateway**: [`Gateway`] resolves templates and configs and routes each request to a
//!   shard picked by consistent hashing of the config id.
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tessera_common::config::{AppConfig, StoreSettings};
use tessera_common::events::ChangeBus;
use tessera_common::logging::init_logging;
use tessera_common::store::{ConfigStore, InMemoryConfigStore, InMemoryTemplateStore, TemplateStore};
use tessera_connectors::DefaultPoolFactory;
use tessera_runtime::{ChangeConsumer, ConsumerHandle, ShardEngine, TemplateCache};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

pub mod codec;
pub mod gateway;
pub mod messages;
pub mod ring;
pub mod router;
pub mod service;
pub mod status;

pub use gateway::{FailureKind, Gateway, PayloadError, QueryPayload};
pub use ring::HashRing;
pub use router::ShardRouter;
pub use service::{Shard, ShardClient, ShardHandler, ShardServiceServer};

pub const DEFAULT_APP_CONFIG_PATH: &str = "config/tessera.yaml";

/// Serves `tessera.Shard` for `engine` on `listener` until `shutdown` resolves.
pub async fn serve_shard(
    engine: Arc<ShardEngine>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    Server::builder()
        .add_service(ShardServiceServer::new(ShardHandler::new(engine)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
        .context("Shard server failed")
}

/// Config store seeded from `stores.configs_path` when set, publishing writes on `bus`.
pub fn config_store(settings: &StoreSettings, bus: ChangeBus) -> anyhow::Result<Arc<dyn ConfigStore>> {
    let store = match &settings.configs_path {
        Some(path) => InMemoryConfigStore::from_yaml_file(path)
            .with_context(|| format!("Failed to load connection configs from {}", path))?,
        None => InMemoryConfigStore::new(),
    };
    Ok(store.with_bus(bus).into_shared())
}

/// Template store seeded from `stores.templates_path` when set, publishing writes on `bus`.
pub fn template_store(
    settings: &StoreSettings,
    bus: ChangeBus,
) -> anyhow::Result<Arc<dyn TemplateStore>> {
    let store = match &settings.templates_path {
        Some(path) => InMemoryTemplateStore::from_yaml_file(path)
            .with_context(|| format!("Failed to load templates from {}", path))?,
        None => InMemoryTemplateStore::new(),
    };
    Ok(store.with_bus(bus).into_shared())
}

/// Wires a [`Gateway`] from configuration. The returned handle keeps the template cache in
/// step with store writes; dropping it stops that.
pub fn build_gateway(app: &AppConfig, bus: &ChangeBus) -> anyhow::Result<(Gateway, ConsumerHandle)> {
    let templates = Arc::new(TemplateCache::new(
        template_store(&app.stores, bus.clone())?,
        &app.cache,
    ));
    let configs = config_store(&app.stores, bus.clone())?;
    let router = Arc::new(ShardRouter::new(&app.router));
    let consumer = ChangeConsumer::new()
        .with_templates(templates.clone())
        .spawn(bus);
    Ok((Gateway::new(templates, configs, router), consumer))
}

/// One execution shard process.
pub struct ShardServer {
    app_config_path: String,
    listen_addr: Option<String>,
}

impl Default for ShardServer {
    fn default() -> Self {
        Self {
            app_config_path: DEFAULT_APP_CONFIG_PATH.to_string(),
            listen_addr: None,
        }
    }
}

impl ShardServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_config(mut self, app_config_path: &str) -> Self {
        self.app_config_path = app_config_path.to_string();
        self
    }

    /// Overrides `server.listen_addr`.
    pub fn with_listen_addr(mut self, addr: Option<String>) -> Self {
        self.listen_addr = addr;
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut app = AppConfig::from_file(&self.app_config_path)?;
        if let Some(addr) = self.listen_addr {
            app.server.listen_addr = addr;
        }
        init_logging(&app.logging)?;

        let bus = ChangeBus::default();
        let configs = config_store(&app.stores, bus.clone())?;
        let factory = Arc::new(DefaultPoolFactory::new(app.pool.clone()));
        let engine = Arc::new(ShardEngine::new(configs, factory, &app));
        let _consumer = ChangeConsumer::new()
            .with_pools(engine.pools())
            .spawn(&bus);
        engine.preload().await;

        let listener = TcpListener::bind(&app.server.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", app.server.listen_addr))?;
        info!("Shard listening on {}", app.server.listen_addr);

        serve_shard(engine, listener, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await
    }
}
