use super::StrategySet;
use crate::output::QueryOutput;
use tessera_common::models::{DatabaseConfig, QueryTemplate};
use tessera_connectors::Pool;
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlBuilder};
use tracing::debug;

impl StrategySet {
    pub(super) async fn delete(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let tables = [template.table_name.trim().to_string()];
        let schema = self.snapshot(config, &tables, pool).await?;
        let builder = self.builder(config, &schema);

        if builder.delete_is_native(template) {
            let stmt = builder.delete(template)?;
            debug!(target: "queries", sql = %stmt.named_sql(), "DELETE");
            return run_delete(&builder, template, &stmt, pool).await;
        }

        let ids = self.select_keys(&builder, template, pool).await?;
        if ids.is_empty() {
            return Ok(QueryOutput::Deleted(0));
        }
        let stmt = builder.delete_by_ids(template, ids)?;
        debug!(target: "queries", sql = %stmt.named_sql(), "DELETE by keys");
        run_delete(&builder, template, &stmt, pool).await
    }
}

async fn run_delete(
    builder: &SqlBuilder<'_>,
    template: &QueryTemplate,
    stmt: &BoundStatement,
    pool: &Pool,
) -> Result<QueryOutput> {
    if !template.returning_fields.is_empty() && builder.dialect().supports_returning() {
        Ok(QueryOutput::Returning(pool.query(stmt).await?))
    } else {
        Ok(QueryOutput::Deleted(pool.execute(stmt).await?))
    }
}
