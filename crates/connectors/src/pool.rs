//! Connection pool cache keyed by config id.
//!
//! Each entry remembers the content hash of the parameter map it was built from. A lookup
//! with a config whose hash differs rebuilds the pool and replaces the entry. Callers that
//! still hold the old `Arc` keep using it until they drop it.

use crate::executor::Pool;
use crate::factory::{connection_context, PoolFactory};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tessera_common::config::{CacheSettings, RetrySettings};
use tessera_common::hashing::config_hash;
use tessera_common::models::DatabaseConfig;
use tessera_common::retry::retry_async_if;
use tessera_common::store::ConfigStore;
use tessera_error::{ErrorCode, Result, TesseraError};
use tracing::{error, info};

#[derive(Clone)]
pub struct CachedPool {
    pub pool: Pool,
    pub config_hash: String,
}

pub struct PoolCache {
    cache: Cache<String, CachedPool>,
    configs: Arc<dyn ConfigStore>,
    factory: Arc<dyn PoolFactory>,
    retry: RetrySettings,
}

impl PoolCache {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        factory: Arc<dyn PoolFactory>,
        settings: &CacheSettings,
        retry: RetrySettings,
    ) -> Self {
        Self {
            cache: Cache::builder()
                .name("pools")
                .max_capacity(settings.pool_capacity)
                .time_to_idle(Duration::from_secs(settings.pool_ttl_secs))
                .build(),
            configs,
            factory,
            retry,
        }
    }

    /// Pool for a config id, loading the config from the store.
    pub async fn get(&self, config_id: &str) -> Result<Pool> {
        let config = self
            .configs
            .find_by_id(config_id)
            .await?
            .ok_or_else(|| TesseraError::config_not_found(config_id))?;
        self.get_for_config(&config).await
    }

    /// Pool for a config the caller already holds.
    pub async fn get_for_config(&self, config: &DatabaseConfig) -> Result<Pool> {
        let hash = config_hash(config)?;

        if let Some(cached) = self.cache.get(&config.id).await {
            if cached.config_hash == hash {
                return Ok(cached.pool);
            }
            info!(
                target: "pool",
                config_id = %config.id,
                "Connection parameters changed, rebuilding pool"
            );
            self.cache.invalidate(&config.id).await;
        }

        let cached = self
            .cache
            .try_get_with(config.id.clone(), self.build(config, hash.clone()))
            .await
            .map_err(|e| (*e).clone())?;
        if cached.config_hash == hash {
            return Ok(cached.pool);
        }

        // A concurrent caller with a different revision of the config won the race.
        let fresh = self.build(config, hash).await?;
        self.cache.insert(config.id.clone(), fresh.clone()).await;
        Ok(fresh.pool)
    }

    pub async fn evict(&self, config_id: &str) {
        self.cache.invalidate(config_id).await;
        info!(target: "pool", config_id = %config_id, "Evicted connection pool");
    }

    pub async fn contains(&self, config_id: &str) -> bool {
        self.cache.get(config_id).await.is_some()
    }

    /// Builds pools for up to `limit` active configs. Failures are logged and skipped.
    /// Returns how many pools were built.
    pub async fn preload(&self, limit: usize) -> usize {
        info!(target: "pool", limit, "Preloading connection pools");
        let configs = match self.configs.find_all().await {
            Ok(configs) => configs,
            Err(e) => {
                error!(target: "errors", error = %e, "Failed to list configs for preload");
                return 0;
            }
        };

        let mut loaded = 0;
        for config in configs.into_iter().filter(|c| c.active).take(limit) {
            match self.get_for_config(&config).await {
                Ok(_) => {
                    loaded += 1;
                    info!(target: "pool", config_id = %config.id, "Preloaded pool for '{}'", config.database_connection_name);
                }
                Err(e) => {
                    error!(
                        target: "errors",
                        config_id = %config.id,
                        error = %e,
                        "Failed to preload pool for '{}'",
                        config.database_connection_name
                    );
                }
            }
        }
        loaded
    }

    async fn build(&self, config: &DatabaseConfig, config_hash: String) -> Result<CachedPool> {
        let pool = retry_async_if(
            &format!("build_pool({})", config.id),
            self.retry,
            || async {
                let pool = self.factory.build(config).await?;
                pool.ping().await.map_err(|e| {
                    TesseraError::new(ErrorCode::ConnectionFailed, e.message)
                        .with_context(connection_context(config))
                })?;
                Ok::<_, TesseraError>(pool)
            },
            |e| {
                matches!(
                    e.code,
                    ErrorCode::ConnectionFailed | ErrorCode::PoolExhausted
                )
            },
        )
        .await?;
        Ok(CachedPool { pool, config_hash })
    }
}
