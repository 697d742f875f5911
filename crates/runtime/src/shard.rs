//! One execution shard: its pools, its metadata and the strategy set over them.

use crate::output::QueryOutput;
use crate::strategy::StrategySet;
use std::sync::Arc;
use std::time::Instant;
use tessera_common::config::{AppConfig, ExecutionSettings};
use tessera_common::models::{ColumnInfo, DatabaseConfig, QueryCondition, QueryTemplate};
use tessera_common::store::ConfigStore;
use tessera_connectors::{MetadataCache, PoolCache, PoolFactory};
use tessera_error::{ErrorCode, Result, TesseraError};
use tracing::{error, info};

pub struct ShardEngine {
    pools: Arc<PoolCache>,
    metadata: Arc<MetadataCache>,
    strategies: StrategySet,
    execution: ExecutionSettings,
}

impl ShardEngine {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        factory: Arc<dyn PoolFactory>,
        app: &AppConfig,
    ) -> Self {
        let pools = Arc::new(PoolCache::new(configs, factory, &app.cache, app.retry));
        let metadata = Arc::new(MetadataCache::new(&app.cache));
        Self {
            strategies: StrategySet::new(metadata.clone(), app.execution.clone()),
            pools,
            metadata,
            execution: app.execution.clone(),
        }
    }

    pub fn pools(&self) -> Arc<PoolCache> {
        self.pools.clone()
    }

    pub fn metadata(&self) -> Arc<MetadataCache> {
        self.metadata.clone()
    }

    /// Builds pools for active configs, up to the configured preload limit.
    pub async fn preload(&self) -> usize {
        let loaded = self.pools.preload(self.execution.preload_limit).await;
        info!(target: "pool", loaded, "Shard preload finished");
        loaded
    }

    /// Executes `template` against `config`. Non-empty `overrides` replace the template's
    /// conditions on a private copy.
    pub async fn run_query(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        overrides: Vec<QueryCondition>,
    ) -> Result<QueryOutput> {
        let started = Instant::now();
        let overridden;
        let template = if overrides.is_empty() {
            template
        } else {
            overridden = template.with_conditions(overrides);
            &overridden
        };

        let pool = self.pools.get_for_config(config).await?;
        let result = self.strategies.execute(template, config, &pool).await;
        match &result {
            Ok(output) => info!(
                target: "queries",
                template_id = %template.id,
                config_id = %config.id,
                rows = output.row_count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "RunQuery completed"
            ),
            Err(e) => error!(
                target: "errors",
                template_id = %template.id,
                config_id = %config.id,
                code = %e.code,
                error = %e,
                "RunQuery failed"
            ),
        }
        result
    }

    /// Catalog columns of `table` on the connection `config_id`.
    pub async fn table_schema(&self, config_id: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        if table.trim().is_empty() {
            return Err(TesseraError::new(
                ErrorCode::BadRequest,
                "Table name must be provided.",
            ));
        }
        let pool = self.pools.get(config_id).await?;
        pool.describe_table(table.trim()).await
    }
}
