//! Column-type cache keyed by (config hash, lower-cased table name).

use crate::executor::Pool;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tessera_common::config::CacheSettings;
use tessera_error::{Result, TesseraError};
use tessera_sql::{ColumnTypeMap, SchemaSnapshot};
use tracing::{info, warn};

type MetadataKey = (String, String);

pub struct MetadataCache {
    cache: Cache<MetadataKey, Arc<ColumnTypeMap>>,
}

impl MetadataCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            cache: Cache::builder()
                .name("table_metadata")
                .max_capacity(settings.metadata_capacity)
                .time_to_idle(Duration::from_secs(settings.metadata_ttl_secs))
                .build(),
        }
    }

    /// Column types for `table`. Concurrent misses for the same key share one catalog load.
    /// A table the catalog does not know yields an empty map, which is cached like any other.
    pub async fn get_column_types(
        &self,
        config_hash: &str,
        table: &str,
        pool: &Pool,
    ) -> Result<Arc<ColumnTypeMap>> {
        let table = table.trim();
        let key = (config_hash.to_string(), table.to_lowercase());
        self.cache
            .try_get_with(key, async {
                let columns = pool.column_types(table).await?;
                if columns.is_empty() {
                    warn!(target: "cache", table = %table, "No catalog columns found");
                } else {
                    info!(target: "cache", table = %table, columns = columns.len(), "Loaded column metadata");
                }
                Ok::<_, TesseraError>(Arc::new(columns))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Column maps for every table in `tables`, ready for a statement builder.
    pub async fn snapshot(
        &self,
        config_hash: &str,
        tables: &[String],
        pool: &Pool,
    ) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        for table in tables {
            if snapshot.contains(table) {
                continue;
            }
            let columns = self.get_column_types(config_hash, table, pool).await?;
            snapshot.insert(table, columns);
        }
        Ok(snapshot)
    }

    pub async fn invalidate(&self, config_hash: &str, table: &str) {
        let key = (config_hash.to_string(), table.trim().to_lowercase());
        self.cache.invalidate(&key).await;
        info!(target: "cache", table = %table, "Invalidated column metadata");
    }
}
