use async_trait::async_trait;
use std::sync::Arc;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::{ErrorCode, ErrorContext, Result, TesseraError};
use tessera_sql::{BoundStatement, ColumnTypeMap, SqlType};

/// One result row, column label to JSON value, in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A pooled connection source for one database config.
///
/// Every driver renders the [`BoundStatement`] for its own provider, so callers only ever
/// hand over named statements.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn provider(&self) -> DatabaseProvider;

    /// Runs a row-returning statement.
    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>>;

    /// Runs a statement and returns the affected row count.
    async fn execute(&self, stmt: &BoundStatement) -> Result<u64>;

    async fn execute_ddl(&self, ddl: &str) -> Result<()>;

    /// Catalog columns of `table`, in ordinal order. Unknown tables yield an empty list.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Checks out a connection and round-trips a trivial statement.
    async fn ping(&self) -> Result<()> {
        self.query(&BoundStatement::raw("SELECT 1")).await.map(|_| ())
    }

    /// Lower-cased column name to [`SqlType`] for `table`.
    async fn column_types(&self, table: &str) -> Result<ColumnTypeMap> {
        let columns = self.describe_table(table).await?;
        Ok(columns
            .into_iter()
            .map(|c| (c.name.to_lowercase(), SqlType::from_catalog(&c.data_type)))
            .collect())
    }
}

pub type Pool = Arc<dyn SqlExecutor>;

pub(crate) fn statement_error(err: impl Into<TesseraError>, sql: &str) -> TesseraError {
    let mut err = err.into();
    if err.code == ErrorCode::StatementFailed {
        err = err.with_context(ErrorContext::Statement {
            table: None,
            sql: Some(sql.to_string()),
        });
    }
    err
}

pub(crate) fn metadata_error(err: impl Into<TesseraError>, table: &str) -> TesseraError {
    let err = err.into();
    if err.code != ErrorCode::StatementFailed {
        return err;
    }
    TesseraError::new(
        ErrorCode::MetadataLoad,
        format!("Failed to load metadata for table '{}': {}", table, err.message),
    )
    .with_context(ErrorContext::Statement {
        table: Some(table.to_string()),
        sql: None,
    })
}

/// `schema.table` split, for catalogs that filter by both.
pub(crate) fn split_qualified(table: &str) -> (Option<&str>, &str) {
    match table.trim().rsplit_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table.trim()),
    }
}

/// `VARCHAR(255)` to 255.
pub(crate) fn declared_size(type_name: &str) -> Option<i64> {
    let start = type_name.find('(')?;
    let end = type_name[start..].find(')')? + start;
    type_name[start + 1..end].split(',').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("public.orders"), (Some("public"), "orders"));
        assert_eq!(split_qualified(" orders "), (None, "orders"));
    }

    #[test]
    fn test_declared_size() {
        assert_eq!(declared_size("VARCHAR(255)"), Some(255));
        assert_eq!(declared_size("decimal(10,2)"), Some(10));
        assert_eq!(declared_size("TEXT"), None);
    }

    #[test]
    fn test_metadata_error_wraps_statement_failures() {
        let err = metadata_error(
            TesseraError::new(ErrorCode::StatementFailed, "no such function"),
            "orders",
        );
        assert_eq!(err.code, ErrorCode::MetadataLoad);

        let err = metadata_error(TesseraError::new(ErrorCode::PoolExhausted, "timeout"), "orders");
        assert_eq!(err.code, ErrorCode::PoolExhausted);
    }
}
