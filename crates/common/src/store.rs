//! Template and connection-config stores.
//!
//! The engine only reads through [`TemplateStore`] and [`ConfigStore`]. The in-memory
//! implementations here back the CLI and tests. They can be seeded from YAML files and publish
//! a [`ChangeEvent`] on every successful write when a [`ChangeBus`] is attached.

use crate::config::DEFAULT_IN_LIST_LIMIT;
use crate::events::{ChangeBus, ChangeEvent, EventType};
use crate::models::{DatabaseConfig, QueryTemplate};
use crate::validation::{validate_config, validate_template};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tessera_error::{ErrorCode, ErrorContext, Result, TesseraError};
use tracing::info;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<QueryTemplate>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<QueryTemplate>>;
    async fn find_all(&self) -> Result<Vec<QueryTemplate>>;
    async fn save(&self, template: QueryTemplate) -> Result<QueryTemplate>;
    async fn update(&self, id: &str, template: QueryTemplate) -> Result<QueryTemplate>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<DatabaseConfig>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<DatabaseConfig>>;
    async fn find_all(&self) -> Result<Vec<DatabaseConfig>>;
    async fn save(&self, config: DatabaseConfig) -> Result<DatabaseConfig>;
    async fn update(&self, id: &str, config: DatabaseConfig) -> Result<DatabaseConfig>;
    async fn delete(&self, id: &str) -> Result<()>;
}

fn new_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TesseraError::new(
            ErrorCode::InvalidYaml,
            format!("Failed to read {}: {}", path.display(), e),
        )
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        TesseraError::new(ErrorCode::InvalidYaml, e.to_string()).with_context(ErrorContext::Config {
            file_path: Some(path.display().to_string()),
            field: None,
        })
    })
}

fn duplicate(kind: &str, name: &str) -> TesseraError {
    TesseraError::new(
        ErrorCode::DuplicateEntity,
        format!("{} with name '{}' already exists.", kind, name),
    )
}

#[derive(Debug)]
pub struct InMemoryTemplateStore {
    templates: DashMap<String, QueryTemplate>,
    bus: Option<ChangeBus>,
    in_list_limit: usize,
}

impl Default for InMemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            bus: None,
            in_list_limit: DEFAULT_IN_LIST_LIMIT,
        }
    }

    pub fn with_bus(mut self, bus: ChangeBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_in_list_limit(mut self, limit: usize) -> Self {
        self.in_list_limit = limit;
        self
    }

    /// Seeds the store from a YAML list of templates. Seeding publishes no events.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new();
        let templates: Vec<QueryTemplate> = read_yaml(path.as_ref())?;
        for mut template in templates {
            validate_template(&template, store.in_list_limit)?;
            if template.id.is_empty() {
                template.id = new_id();
            }
            if store.name_taken(&template.template_name, None) {
                return Err(duplicate("Template", &template.template_name));
            }
            store.templates.insert(template.id.clone(), template);
        }
        info!(
            "Loaded {} templates from {}",
            store.templates.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    pub fn into_shared(self) -> Arc<dyn TemplateStore> {
        Arc::new(self)
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        self.templates.iter().any(|entry| {
            entry.template_name == name && Some(entry.key().as_str()) != except_id
        })
    }

    fn publish(&self, id: &str, event_type: EventType) {
        if let Some(bus) = &self.bus {
            bus.publish(ChangeEvent::template(id, event_type));
        }
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<QueryTemplate>> {
        Ok(self.templates.get(id).map(|t| t.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<QueryTemplate>> {
        Ok(self
            .templates
            .iter()
            .find(|t| t.template_name == name)
            .map(|t| t.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<QueryTemplate>> {
        let mut all: Vec<QueryTemplate> = self.templates.iter().map(|t| t.value().clone()).collect();
        all.sort_by(|a, b| a.template_name.cmp(&b.template_name));
        Ok(all)
    }

    async fn save(&self, mut template: QueryTemplate) -> Result<QueryTemplate> {
        validate_template(&template, self.in_list_limit)?;
        if self.name_taken(&template.template_name, None) {
            return Err(duplicate("Template", &template.template_name));
        }
        if template.id.is_empty() {
            template.id = new_id();
        }
        let stamp = now();
        template.created_at = Some(stamp);
        template.updated_at = Some(stamp);

        self.templates.insert(template.id.clone(), template.clone());
        self.publish(&template.id, EventType::Save);
        Ok(template)
    }

    async fn update(&self, id: &str, mut template: QueryTemplate) -> Result<QueryTemplate> {
        let existing = self
            .templates
            .get(id)
            .map(|t| t.value().clone())
            .ok_or_else(|| TesseraError::template_not_found(id))?;

        if existing.template_name != template.template_name {
            return Err(TesseraError::template("Template name cannot be changed."));
        }
        validate_template(&template, self.in_list_limit)?;

        template.id = id.to_string();
        template.created_at = existing.created_at;
        template.updated_at = Some(now());
        self.templates.insert(id.to_string(), template.clone());
        self.publish(id, EventType::Update);
        Ok(template)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.templates
            .remove(id)
            .ok_or_else(|| TesseraError::template_not_found(id))?;
        self.publish(id, EventType::Delete);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: DashMap<String, DatabaseConfig>,
    bus: Option<ChangeBus>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bus(mut self, bus: ChangeBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Seeds the store from a YAML list of connection configs. Seeding publishes no events.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new();
        let configs: Vec<DatabaseConfig> = read_yaml(path.as_ref())?;
        for mut config in configs {
            validate_config(&config)?;
            if config.id.is_empty() {
                config.id = new_id();
            }
            if store.name_taken(&config.database_connection_name, None) {
                return Err(duplicate("Database config", &config.database_connection_name));
            }
            store.configs.insert(config.id.clone(), config);
        }
        info!(
            "Loaded {} connection configs from {}",
            store.configs.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    pub fn into_shared(self) -> Arc<dyn ConfigStore> {
        Arc::new(self)
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        self.configs.iter().any(|entry| {
            entry.database_connection_name == name && Some(entry.key().as_str()) != except_id
        })
    }

    fn publish(&self, id: &str, event_type: EventType) {
        if let Some(bus) = &self.bus {
            bus.publish(ChangeEvent::config(id, event_type));
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<DatabaseConfig>> {
        Ok(self.configs.get(id).map(|c| c.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<DatabaseConfig>> {
        Ok(self
            .configs
            .iter()
            .find(|c| c.database_connection_name == name)
            .map(|c| c.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<DatabaseConfig>> {
        let mut all: Vec<DatabaseConfig> = self.configs.iter().map(|c| c.value().clone()).collect();
        all.sort_by(|a, b| a.database_connection_name.cmp(&b.database_connection_name));
        Ok(all)
    }

    async fn save(&self, mut config: DatabaseConfig) -> Result<DatabaseConfig> {
        validate_config(&config)?;
        if self.name_taken(&config.database_connection_name, None) {
            return Err(duplicate("Database config", &config.database_connection_name));
        }
        if config.id.is_empty() {
            config.id = new_id();
        }
        let stamp = now();
        config.created_at = Some(stamp);
        config.updated_at = Some(stamp);

        self.configs.insert(config.id.clone(), config.clone());
        self.publish(&config.id, EventType::Save);
        Ok(config)
    }

    async fn update(&self, id: &str, mut config: DatabaseConfig) -> Result<DatabaseConfig> {
        let existing = self
            .configs
            .get(id)
            .map(|c| c.value().clone())
            .ok_or_else(|| TesseraError::config_not_found(id))?;

        if existing.database_connection_name != config.database_connection_name {
            return Err(TesseraError::new(
                ErrorCode::SchemaViolation,
                "Database connection name cannot be changed.",
            ));
        }
        validate_config(&config)?;

        config.id = id.to_string();
        config.created_at = existing.created_at;
        config.updated_at = Some(now());
        self.configs.insert(id.to_string(), config.clone());
        self.publish(id, EventType::Update);
        Ok(config)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.configs
            .remove(id)
            .ok_or_else(|| TesseraError::config_not_found(id))?;
        self.publish(id, EventType::Delete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionParams, DatabaseProvider, SelectedColumn, StatementKind};
    use std::io::Write;

    fn template(name: &str) -> QueryTemplate {
        let mut t = QueryTemplate::new(StatementKind::Select, "orders");
        t.template_name = name.into();
        t.selected_columns.push(SelectedColumn::new("id"));
        t
    }

    fn sqlite_config(name: &str) -> DatabaseConfig {
        let mut params = ConnectionParams::new();
        params.insert("url".into(), "sqlite::memory:".into());
        DatabaseConfig {
            id: String::new(),
            database_connection_name: name.into(),
            provider: DatabaseProvider::Sqlite,
            config: params,
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_template_save_assigns_id_and_rejects_duplicates() {
        let store = InMemoryTemplateStore::new();
        let saved = store.save(template("open_orders")).await.unwrap();
        assert!(!saved.id.is_empty());
        assert!(saved.created_at.is_some());

        let err = store.save(template("open_orders")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateEntity);

        let found = store.find_by_name("open_orders").await.unwrap().unwrap();
        assert_eq!(found.id, saved.id);
    }

    #[tokio::test]
    async fn test_template_name_is_immutable() {
        let store = InMemoryTemplateStore::new();
        let saved = store.save(template("a")).await.unwrap();

        let mut renamed = saved.clone();
        renamed.template_name = "b".into();
        let err = store.update(&saved.id, renamed).await.unwrap_err();
        assert!(err.message.contains("cannot be changed"));

        let mut changed = saved.clone();
        changed.limit = Some(10);
        let updated = store.update(&saved.id, changed).await.unwrap();
        assert_eq!(updated.limit, Some(10));
        assert_eq!(updated.created_at, saved.created_at);
    }

    #[tokio::test]
    async fn test_config_name_is_immutable() {
        let store = InMemoryConfigStore::new();
        let saved = store.save(sqlite_config("local")).await.unwrap();

        let mut renamed = saved.clone();
        renamed.database_connection_name = "other".into();
        let err = store.update(&saved.id, renamed).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaViolation);

        let mut moved = saved.clone();
        moved
            .config
            .insert("url".into(), "sqlite:/tmp/other.db".into());
        let updated = store.update(&saved.id, moved).await.unwrap();
        assert_eq!(updated.param("url").as_deref(), Some("sqlite:/tmp/other.db"));
    }

    #[tokio::test]
    async fn test_writes_publish_events() {
        let bus = ChangeBus::new(16);
        let mut rx = bus.subscribe();
        let store = InMemoryConfigStore::new().with_bus(bus);

        let saved = store.save(sqlite_config("local")).await.unwrap();
        store.delete(&saved.id).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::Save);
        assert_eq!(first.entity_id, saved.id);
        assert_eq!(rx.recv().await.unwrap().event_type, EventType::Delete);

        let err = store.delete(&saved.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[tokio::test]
    async fn test_config_store_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- id: pg-main
  databaseConnectionName: main
  provider: POSTGRESQL
  config:
    url: postgresql://db:5432/app
    username: app
    password: secret
- databaseConnectionName: scratch
  provider: SQLITE
  config:
    path: /tmp/scratch.db
"#
        )
        .unwrap();

        let store = InMemoryConfigStore::from_yaml_file(file.path()).unwrap();
        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let main = store.find_by_id("pg-main").await.unwrap().unwrap();
        assert_eq!(main.provider, DatabaseProvider::PostgreSql);
    }

    #[tokio::test]
    async fn test_yaml_rejects_invalid_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- templateName: broken
  queryType: SELECT
  tableName: orders
"#
        )
        .unwrap();

        let err = InMemoryTemplateStore::from_yaml_file(file.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateError);
    }
}
