use super::{tables_for, StrategySet};
use crate::output::QueryOutput;
use tessera_common::models::{DatabaseConfig, QueryTemplate};
use tessera_connectors::{Pool, Row};
use tessera_error::Result;
use tracing::{debug, warn};

impl StrategySet {
    /// Runs the SELECT. A failure that is not a build error invalidates the metadata of
    /// every table involved and retries once with fresh column types.
    pub(super) async fn select(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        pool: &Pool,
    ) -> Result<QueryOutput> {
        let tables = tables_for(template);
        match self.run_select(template, config, &tables, pool).await {
            Ok(rows) => Ok(QueryOutput::Rows(rows)),
            Err(e) if e.is_build_error() => Err(e),
            Err(e) => {
                warn!(
                    target: "queries",
                    template = %template.template_name,
                    error = %e,
                    "SELECT failed, retrying with refreshed metadata"
                );
                self.invalidate(config, &tables).await?;
                let rows = self.run_select(template, config, &tables, pool).await?;
                Ok(QueryOutput::Rows(rows))
            }
        }
    }

    async fn run_select(
        &self,
        template: &QueryTemplate,
        config: &DatabaseConfig,
        tables: &[String],
        pool: &Pool,
    ) -> Result<Vec<Row>> {
        let schema = self.snapshot(config, tables, pool).await?;
        let stmt = self.builder(config, &schema).select(template)?;
        debug!(target: "queries", sql = %stmt.named_sql(), "SELECT");
        pool.query(&stmt).await
    }
}
