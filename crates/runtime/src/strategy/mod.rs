//! Statement-kind strategies.
//!
//! [`Strategy`] is resolved from the template's statement kind and drives one of the
//! per-kind paths below. Every path except CREATE and raw SQL loads the column types of the
//! tables it touches before any SQL is assembled.

mod create;
mod delete;
mod insert;
mod select;
mod update;

use crate::output::QueryOutput;
use std::sync::Arc;
use tessera_common::config::ExecutionSettings;
use tessera_common::hashing::config_hash;
use tessera_common::models::{DatabaseConfig, QueryTemplate, StatementKind};
use tessera_connectors::{MetadataCache, Pool, Row};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SchemaSnapshot, SqlBuilder, SqlValue};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Select,
    Insert,
    Update,
    Delete,
    Create,
}

impl From<StatementKind> for Strategy {
    fn from(kind: StatementKind) -> Self {
        match kind {
            StatementKind::Select => Self::Select,
            StatementKind::Insert => Self::Insert,
            StatementKind::Update => Self::Update,
            StatementKind::Delete => Self::Delete,
            StatementKind::Create => Self::Create,
        }
    }
}

/// The strategies of one shard. Shares the shard's metadata cache.
pub struct StrategySet {
    metadata: Arc<MetadataCache>,
    settings: ExecutionSettings,
}

impl StrategySet {
    pub fn new(metadata: Arc<MetadataCache>, settings: ExecutionSettings) -> Self {
        Self { metadata, settings }
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub async fn execute(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        if let Some(sql) = template.raw_sql() {
            return self.execute_raw(template, config, sql, pool).await;
        }

        let strategy = Strategy::from(template.statement_kind);
        debug!(
            target: "queries",
            template = %template.template_name,
            strategy = ?strategy,
            provider = %config.provider,
            "Executing template"
        );
        let output = match strategy {
            Strategy::Select => self.select(template, config, pool).await?,
            Strategy::Insert => self.insert(template, config, pool).await?,
            Strategy::Update => self.update(template, config, pool).await?,
            Strategy::Delete => self.delete(template, config, pool).await?,
            Strategy::Create => self.create(template, config, pool).await?,
        };
        info!(
            target: "queries",
            template = %template.template_name,
            strategy = ?strategy,
            rows = output.row_count(),
            "Template executed"
        );
        Ok(output)
    }

    /// Literal SQL skips assembly and metadata entirely.
    async fn execute_raw(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        sql: &str,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let kind = template.statement_kind;
        debug!(target: "queries", kind = %kind, "Executing raw SQL override");
        let stmt = BoundStatement::raw(sql);
        Ok(match kind {
            StatementKind::Select => QueryOutput::Rows(pool.query(&stmt).await?),
            StatementKind::Insert => QueryOutput::Inserted(pool.execute(&stmt).await?),
            StatementKind::Update => QueryOutput::Updated(pool.execute(&stmt).await?),
            StatementKind::Delete => QueryOutput::Deleted(pool.execute(&stmt).await?),
            StatementKind::Create => {
                pool.execute_ddl(sql).await?;
                self.invalidate(config, &create::created_tables(template)).await?;
                QueryOutput::DdlExecuted
            }
        })
    }

    async fn snapshot(
        &self,
        config: &DatabaseConfig,
        tables: &[String],
        pool: &Pool,
    ) -> Result<SchemaSnapshot> {
        let hash = config_hash(config)?;
        self.metadata.snapshot(&hash, tables, pool).await
    }

    async fn invalidate(&self, config: &DatabaseConfig, tables: &[String]) -> Result<()> {
        let hash = config_hash(config)?;
        for table in tables {
            self.metadata.invalidate(&hash, table).await;
        }
        Ok(())
    }

    fn builder<'s>(&self, config: &DatabaseConfig, schema: &'s SchemaSnapshot) -> SqlBuilder<'s> {
        SqlBuilder::new(config.provider, schema).with_in_list_limit(self.settings.in_list_limit)
    }

    /// Runs the key selection of join emulation and returns the distinct primary keys.
    async fn select_keys(
        &self,
        builder: &SqlBuilder<'_>,
        template: &QueryTemplate,
        pool: &Pool,
    ) -> Result<Vec<SqlValue>> {
        let stmt = builder.key_select(template)?;
        debug!(target: "queries", sql = %stmt.named_sql(), "Selecting keys for join emulation");
        let rows = pool.query(&stmt).await?;
        Ok(key_values(rows, template.primary_key()))
    }
}

/// Tables whose column types a template needs: the base table and every UNION branch.
pub fn tables_for(template: &QueryTemplate) -> Vec<String> {
    let mut tables = vec![template.table_name.trim().to_string()];
    for union in &template.unions {
        for table in tables_for(&union.template) {
            if !tables.iter().any(|t| t.eq_ignore_ascii_case(&table)) {
                tables.push(table);
            }
        }
    }
    tables
}

fn key_values(rows: Vec<Row>, pk: &str) -> Vec<SqlValue> {
    rows.into_iter()
        .filter_map(|mut row| {
            let key = row
                .keys()
                .find(|k| k.eq_ignore_ascii_case(pk))
                .cloned()
                .or_else(|| row.keys().next().cloned())?;
            row.remove(&key)
        })
        .filter(|value| !value.is_null())
        .map(|value| SqlValue::from_json(&value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_common::models::UnionQuery;

    #[test]
    fn test_tables_for_union_branches() {
        let mut template = QueryTemplate::new(StatementKind::Select, "orders");
        let mut branch = QueryTemplate::new(StatementKind::Select, "archived_orders");
        branch.unions = vec![UnionQuery {
            template: Box::new(QueryTemplate::new(StatementKind::Select, "ORDERS")),
            union_all: false,
        }];
        template.unions = vec![UnionQuery {
            template: Box::new(branch),
            union_all: true,
        }];
        assert_eq!(tables_for(&template), vec!["orders", "archived_orders"]);
    }

    #[test]
    fn test_key_values_skip_nulls() {
        let rows: Vec<Row> = vec![
            json!({"ID": 4}),
            json!({"id": null}),
            json!({"order_id": "A-9"}),
        ]
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
        assert_eq!(
            key_values(rows, "id"),
            vec![SqlValue::BigInt(4), SqlValue::Text("A-9".into())]
        );
    }
}
