//! Template cache in front of the template store.
//!
//! Entries are shared read-only. A caller that needs different conditions copies the
//! template (see [`QueryTemplate::with_conditions`]) and never writes back.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tessera_common::config::CacheSettings;
use tessera_common::hashing::template_hash;
use tessera_common::models::QueryTemplate;
use tessera_common::store::TemplateStore;
use tessera_error::{Result, TesseraError};
use tracing::{debug, info};

#[derive(Clone)]
struct CachedTemplate {
    template: Arc<QueryTemplate>,
    hash: String,
}

pub struct TemplateCache {
    cache: Cache<String, CachedTemplate>,
    store: Arc<dyn TemplateStore>,
}

impl TemplateCache {
    pub fn new(store: Arc<dyn TemplateStore>, settings: &CacheSettings) -> Self {
        Self {
            cache: Cache::builder()
                .name("templates")
                .max_capacity(settings.template_capacity)
                .time_to_idle(Duration::from_secs(settings.template_ttl_secs))
                .build(),
            store,
        }
    }

    /// Loads through the store on a miss. Concurrent misses for one id share the load.
    pub async fn get_by_id(&self, id: &str) -> Result<Arc<QueryTemplate>> {
        let cached = self
            .cache
            .try_get_with(id.to_string(), async {
                let template = self
                    .store
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| TesseraError::template_not_found(id))?;
                let hash = template_hash(&template)?;
                info!(target: "cache", template_id = %id, "Loaded template '{}'", template.template_name);
                Ok::<_, TesseraError>(CachedTemplate {
                    template: Arc::new(template),
                    hash,
                })
            })
            .await
            .map_err(|e| (*e).clone())?;
        Ok(cached.template)
    }

    /// Returns the cached instance when it has the same content as `template`. Otherwise
    /// caches `template` and returns it.
    pub async fn reconcile(&self, template: QueryTemplate) -> Result<Arc<QueryTemplate>> {
        let hash = template_hash(&template)?;
        if let Some(cached) = self.cache.get(&template.id).await {
            if cached.hash == hash {
                return Ok(cached.template);
            }
            debug!(target: "cache", template_id = %template.id, "Template content changed, replacing entry");
        }
        let id = template.id.clone();
        let template = Arc::new(template);
        self.cache
            .insert(
                id,
                CachedTemplate {
                    template: template.clone(),
                    hash,
                },
            )
            .await;
        Ok(template)
    }

    pub async fn evict(&self, id: &str) {
        self.cache.invalidate(id).await;
        info!(target: "cache", template_id = %id, "Evicted template");
    }

    /// Puts `template` in the cache unconditionally.
    pub async fn preload(&self, template: QueryTemplate) -> Result<()> {
        let hash = template_hash(&template)?;
        let id = template.id.clone();
        self.cache
            .insert(
                id,
                CachedTemplate {
                    template: Arc::new(template),
                    hash,
                },
            )
            .await;
        Ok(())
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.cache.get(id).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::models::{SelectedColumn, StatementKind};
    use tessera_common::store::InMemoryTemplateStore;
    use tessera_error::ErrorCode;

    fn template(name: &str) -> QueryTemplate {
        let mut template = QueryTemplate::new(StatementKind::Select, "orders");
        template.template_name = name.into();
        template.selected_columns = vec![SelectedColumn::new("id")];
        template
    }

    async fn setup() -> (TemplateCache, Arc<InMemoryTemplateStore>, String) {
        let store = Arc::new(InMemoryTemplateStore::new());
        let saved = store.save(template("open_orders")).await.unwrap();
        let cache = TemplateCache::new(store.clone(), &CacheSettings::default());
        (cache, store, saved.id)
    }

    #[tokio::test]
    async fn test_get_by_id_caches() {
        let (cache, store, id) = setup().await;
        let first = cache.get_by_id(&id).await.unwrap();

        // The store changing underneath does not affect the cached entry.
        let mut changed = (*first).clone();
        changed.limit = Some(5);
        store.update(&id, changed).await.unwrap();

        let second = cache.get_by_id(&id).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.limit, None);

        cache.evict(&id).await;
        assert_eq!(cache.get_by_id(&id).await.unwrap().limit, Some(5));
    }

    #[tokio::test]
    async fn test_missing_template() {
        let (cache, _, _) = setup().await;
        let err = cache.get_by_id("missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateNotFound);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_identical_instance() {
        let (cache, _, id) = setup().await;
        let cached = cache.get_by_id(&id).await.unwrap();

        let same = cache.reconcile((*cached).clone()).await.unwrap();
        assert!(Arc::ptr_eq(&cached, &same));

        let mut edited = (*cached).clone();
        edited.distinct = true;
        let replaced = cache.reconcile(edited).await.unwrap();
        assert!(!Arc::ptr_eq(&cached, &replaced));
        assert!(cache.get_by_id(&id).await.unwrap().distinct);
    }

    #[tokio::test]
    async fn test_preload_without_store() {
        let (cache, _, _) = setup().await;
        let mut detached = template("adhoc");
        detached.id = "t-adhoc".into();
        cache.preload(detached).await.unwrap();
        assert!(cache.contains("t-adhoc").await);
        assert_eq!(cache.get_by_id("t-adhoc").await.unwrap().template_name, "adhoc");
    }
}
