use super::StrategySet;
use crate::output::QueryOutput;
use tessera_common::models::{DatabaseConfig, QueryTemplate};
use tessera_connectors::Pool;
use tessera_error::Result;
use tracing::debug;

impl StrategySet {
    /// With returning fields the result is the returned rows: read natively where the
    /// dialect has RETURNING, otherwise by a follow-up SELECT on the inserted values.
    pub(super) async fn insert(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let tables = [template.table_name.trim().to_string()];
        let schema = self.snapshot(config, &tables, pool).await?;
        let builder = self.builder(config, &schema);
        let stmt = builder.insert(template)?;
        debug!(target: "queries", sql = %stmt.named_sql(), "INSERT");

        if template.returning_fields.is_empty() {
            return Ok(QueryOutput::Inserted(pool.execute(&stmt).await?));
        }
        if builder.dialect().supports_returning() {
            return Ok(QueryOutput::Returning(pool.query(&stmt).await?));
        }

        let inserted = pool.execute(&stmt).await?;
        match builder.returning_select(template)? {
            Some(select) => {
                debug!(target: "queries", sql = %select.named_sql(), "RETURNING emulation");
                Ok(QueryOutput::Returning(pool.query(&select).await?))
            }
            None => Ok(QueryOutput::Inserted(inserted)),
        }
    }
}
