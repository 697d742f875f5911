use super::{table_name, SqlBuilder};
use crate::sanitize::{column_key, validate_identifier};
use crate::statement::BoundStatement;
use crate::types::SqlValue;
use tessera_common::models::QueryTemplate;
use tessera_error::{Result, TesseraError};

impl<'a> SqlBuilder<'a> {
    /// `UPDATE table SET ... [WHERE ...]` for templates without joins.
    pub fn update(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        let mut stmt = self.update_head(template)?;
        self.push_filter(&mut stmt, template, Some("where_"))?;
        Ok(stmt)
    }

    /// One batch of join emulation: `UPDATE table SET ... WHERE pk IN (:ids)`.
    pub fn update_by_ids(&self, template: &QueryTemplate, ids: Vec<SqlValue>) -> Result<BoundStatement> {
        let pk = template.primary_key();
        validate_identifier(pk)?;
        let mut stmt = self.update_head(template)?;
        stmt.push_sql(format!(" WHERE {} IN (", pk));
        stmt.bind("ids", SqlValue::List(ids));
        stmt.push_sql(")");
        Ok(stmt)
    }

    fn update_head(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        let table = table_name(template)?;
        if template.updated_values.is_empty() {
            return Err(TesseraError::template("Update values must be provided."));
        }
        let columns = self.columns(table);
        for column in template.updated_values.keys() {
            if !columns.contains_key(&column_key(column)) {
                return Err(TesseraError::invalid_column(
                    column.trim(),
                    table,
                    "SET",
                    columns.keys().cloned(),
                ));
            }
        }

        let mut stmt = BoundStatement::new();
        stmt.push_sql(format!("UPDATE {} SET ", table));
        self.push_assignments(&mut stmt, table, &template.updated_values, "set_")?;
        Ok(stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnTypeMap, SchemaSnapshot, SqlType};
    use serde_json::json;
    use std::sync::Arc;
    use tessera_common::models::{
        DatabaseProvider, JoinConfig, JoinKind, QueryCondition, QueryOperator, StatementKind,
    };
    use tessera_error::ErrorCode;

    fn schema() -> SchemaSnapshot {
        let mut columns = ColumnTypeMap::new();
        columns.insert("id".into(), SqlType::BigInt);
        columns.insert("status".into(), SqlType::Text);
        columns.insert("archived".into(), SqlType::Boolean);
        SchemaSnapshot::single("orders", Arc::new(columns))
    }

    fn update() -> QueryTemplate {
        let mut template = QueryTemplate::new(StatementKind::Update, "orders");
        template.updated_values = serde_json::from_value(json!({"archived": "1"})).unwrap();
        template
    }

    #[test]
    fn test_simple_update() {
        let schema = schema();
        let mut template = update();
        template.conditions = vec![
            QueryCondition::new("status", QueryOperator::Equals, "CLOSED"),
            QueryCondition::new("missing", QueryOperator::Equals, "x"),
        ];
        let stmt = SqlBuilder::new(DatabaseProvider::PostgreSql, &schema)
            .update(&template)
            .unwrap();
        assert_eq!(
            stmt.named_sql(),
            "UPDATE orders SET archived = :set_archived WHERE status = :where_status"
        );
        assert_eq!(stmt.param("set_archived"), Some(&SqlValue::Bool(true)));
    }

    #[test]
    fn test_unknown_set_column_fails() {
        let schema = schema();
        let mut template = update();
        template.updated_values = serde_json::from_value(json!({"stauts": "x"})).unwrap();
        let err = SqlBuilder::new(DatabaseProvider::MySql, &schema)
            .update(&template)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidColumn);
        assert_eq!(err.hint.as_deref(), Some("Did you mean 'status'?"));
    }

    #[test]
    fn test_join_emulation_statements() {
        let schema = schema();
        let mut template = update();
        template.joins = vec![JoinConfig {
            kind: JoinKind::Inner,
            table: "customers".into(),
            alias: Some("c".into()),
            on_condition: Some("orders.customer_id = c.id".into()),
        }];
        template.conditions = vec![QueryCondition::new("status", QueryOperator::Equals, "OPEN")];

        let builder = SqlBuilder::new(DatabaseProvider::PostgreSql, &schema);
        let keys = builder.key_select(&template).unwrap();
        assert_eq!(
            keys.named_sql(),
            "SELECT DISTINCT orders.id FROM orders INNER JOIN customers c \
             ON orders.customer_id = c.id WHERE status = :where_status"
        );

        let batch = builder
            .update_by_ids(&template, vec![SqlValue::BigInt(1), SqlValue::BigInt(2)])
            .unwrap();
        assert_eq!(
            batch.named_sql(),
            "UPDATE orders SET archived = :set_archived WHERE id IN (:ids)"
        );
        let (sql, args) = batch.render(DatabaseProvider::PostgreSql);
        assert_eq!(sql, "UPDATE orders SET archived = $1 WHERE id IN ($2, $3)");
        assert_eq!(args.len(), 3);
    }
}
