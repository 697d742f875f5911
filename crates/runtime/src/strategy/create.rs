use super::StrategySet;
use crate::output::QueryOutput;
use tessera_common::models::{DatabaseConfig, QueryTemplate};
use tessera_connectors::Pool;
use tessera_error::Result;
use tessera_sql::SchemaSnapshot;
use tracing::info;

impl StrategySet {
    pub(super) async fn create(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let schema = SchemaSnapshot::new();
        let ddl = self.builder(config, &schema).create(template)?;
        info!(target: "queries", provider = %config.provider, ddl = %ddl, "Executing DDL");
        pool.execute_ddl(&ddl).await?;
        self.invalidate(config, &created_tables(template)).await?;
        Ok(QueryOutput::DdlExecuted)
    }
}

/// Tables whose cached column types a CREATE template can change.
pub(super) fn created_tables(template: &QueryTemplate) -> Vec<String> {
    let mut tables = vec![template.table_name.trim().to_string()];
    if let Some(name) = template
        .create_table
        .as_ref()
        .and_then(|block| block.table_name.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        if !tables.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            tables.push(name.to_string());
        }
    }
    tables.retain(|t| !t.is_empty());
    tables
}
