use super::StrategySet;
use crate::output::QueryOutput;
use futures::stream::{self, StreamExt, TryStreamExt};
use tessera_common::models::{DatabaseConfig, QueryTemplate};
use tessera_connectors::Pool;
use tessera_error::Result;
use tessera_sql::BoundStatement;
use tracing::{debug, info};

impl StrategySet {
    /// Joins are always emulated: keys first, then `UPDATE ... WHERE pk IN (...)` batches.
    pub(super) async fn update(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let tables = [template.table_name.trim().to_string()];
        let schema = self.snapshot(config, &tables, pool).await?;
        let builder = self.builder(config, &schema);

        if template.joins.is_empty() {
            let stmt = builder.update(template)?;
            debug!(target: "queries", sql = %stmt.named_sql(), "UPDATE");
            return Ok(QueryOutput::Updated(pool.execute(&stmt).await?));
        }

        let ids = self.select_keys(&builder, template, pool).await?;
        if ids.is_empty() {
            return Ok(QueryOutput::Updated(0));
        }

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<BoundStatement> = ids
            .chunks(batch_size)
            .map(|chunk| builder.update_by_ids(template, chunk.to_vec()))
            .collect::<Result<_>>()?;
        info!(
            target: "queries",
            table = %template.table_name,
            keys = ids.len(),
            batches = batches.len(),
            "Running batched UPDATE for join emulation"
        );

        let updated = stream::iter(batches)
            .map(|stmt| async move { pool.execute(&stmt).await })
            .buffer_unordered(self.settings.batch_parallelism.max(1))
            .try_fold(0u64, |total, n| async move { Ok(total + n) })
            .await?;
        Ok(QueryOutput::Updated(updated))
    }
}
