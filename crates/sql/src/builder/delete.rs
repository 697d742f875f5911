use super::{push_joins, returning_clause, table_name, validate_identifiers, SqlBuilder};
use crate::sanitize::validate_identifier;
use crate::statement::BoundStatement;
use crate::types::SqlValue;
use tessera_common::models::QueryTemplate;
use tessera_common::validation::validate_joins;
use tessera_error::{Result, TesseraError};

impl<'a> SqlBuilder<'a> {
    /// Whether a DELETE template runs as one statement. Templates with joins on providers
    /// without `DELETE t FROM t JOIN ...` go through key selection instead.
    pub fn delete_is_native(&self, template: &QueryTemplate) -> bool {
        template.joins.is_empty() || self.dialect.supports_join_delete()
    }

    /// `DELETE FROM table [WHERE] [RETURNING]`, or the native multi-table form when the
    /// template has joins.
    pub fn delete(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        let table = table_name(template)?;
        let mut stmt = BoundStatement::new();

        if template.joins.is_empty() {
            stmt.push_sql(format!("DELETE FROM {}", table));
        } else {
            if !self.dialect.supports_join_delete() {
                return Err(TesseraError::unsupported(format!(
                    "DELETE with JOIN is not native on {}.",
                    self.provider
                )));
            }
            validate_joins(table, &template.joins)?;
            match template
                .delete_table_alias
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
            {
                Some(alias) => {
                    validate_identifier(alias)?;
                    stmt.push_sql(format!("DELETE {} FROM {} {}", alias, table, alias));
                }
                None => {
                    stmt.push_sql(format!("DELETE {} FROM {}", table, table));
                }
            }
            push_joins(&mut stmt, &template.joins);
        }

        self.push_filter(&mut stmt, template, Some("where_"))?;
        self.push_returning(&mut stmt, template)?;
        Ok(stmt)
    }

    /// Second phase of join emulation: `DELETE FROM table WHERE pk IN (:ids)`.
    pub fn delete_by_ids(&self, template: &QueryTemplate, ids: Vec<SqlValue>) -> Result<BoundStatement> {
        let table = table_name(template)?;
        let pk = template.primary_key();
        validate_identifier(pk)?;

        let mut stmt = BoundStatement::new();
        stmt.push_sql(format!("DELETE FROM {} WHERE {} IN (", table, pk));
        stmt.bind("ids", SqlValue::List(ids));
        stmt.push_sql(")");
        self.push_returning(&mut stmt, template)?;
        Ok(stmt)
    }

    fn push_returning(&self, stmt: &mut BoundStatement, template: &QueryTemplate) -> Result<()> {
        if !template.returning_fields.is_empty() && self.dialect.supports_returning() {
            validate_identifiers(&template.returning_fields)?;
            stmt.push_sql(returning_clause(&template.returning_fields));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnTypeMap, SchemaSnapshot, SqlType};
    use std::sync::Arc;
    use tessera_common::models::{
        DatabaseProvider, JoinConfig, JoinKind, QueryCondition, QueryOperator, StatementKind,
    };

    fn schema() -> SchemaSnapshot {
        let mut columns = ColumnTypeMap::new();
        columns.insert("id".into(), SqlType::BigInt);
        columns.insert("status".into(), SqlType::Text);
        SchemaSnapshot::single("orders", Arc::new(columns))
    }

    fn joined_delete() -> QueryTemplate {
        let mut template = QueryTemplate::new(StatementKind::Delete, "orders");
        template.joins = vec![JoinConfig {
            kind: JoinKind::Inner,
            table: "customers".into(),
            alias: Some("c".into()),
            on_condition: Some("orders.customer_id = c.id".into()),
        }];
        template.conditions = vec![QueryCondition::new("status", QueryOperator::Equals, "VOID")];
        template
    }

    #[test]
    fn test_simple_delete_with_returning() {
        let schema = schema();
        let mut template = QueryTemplate::new(StatementKind::Delete, "orders");
        template.conditions = vec![QueryCondition::new("id", QueryOperator::Equals, "7")];
        template.returning_fields = vec!["id".into()];

        let pg = SqlBuilder::new(DatabaseProvider::PostgreSql, &schema)
            .delete(&template)
            .unwrap();
        assert_eq!(pg.named_sql(), "DELETE FROM orders WHERE id = :where_id RETURNING id");

        let mysql = SqlBuilder::new(DatabaseProvider::MySql, &schema)
            .delete(&template)
            .unwrap();
        assert_eq!(mysql.named_sql(), "DELETE FROM orders WHERE id = :where_id");
    }

    #[test]
    fn test_native_join_delete_on_mysql() {
        let schema = schema();
        let builder = SqlBuilder::new(DatabaseProvider::MySql, &schema);
        let template = joined_delete();
        assert!(builder.delete_is_native(&template));
        assert_eq!(
            builder.delete(&template).unwrap().named_sql(),
            "DELETE orders FROM orders INNER JOIN customers c \
             ON orders.customer_id = c.id WHERE status = :where_status"
        );
    }

    #[test]
    fn test_join_delete_emulated_elsewhere() {
        let schema = schema();
        let builder = SqlBuilder::new(DatabaseProvider::PostgreSql, &schema);
        let template = joined_delete();
        assert!(!builder.delete_is_native(&template));
        assert!(builder.delete(&template).is_err());

        let stmt = builder
            .delete_by_ids(&template, vec![SqlValue::BigInt(4)])
            .unwrap();
        assert_eq!(stmt.named_sql(), "DELETE FROM orders WHERE id IN (:ids)");
    }
}
