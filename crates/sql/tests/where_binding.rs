//! WHERE assembly against a known schema: one bound parameter per condition on a known
//! column, nothing for unknown columns.

use proptest::prelude::*;
use std::sync::Arc;
use tessera_common::models::{
    DatabaseProvider, QueryCondition, QueryOperator, QueryTemplate, SelectedColumn, StatementKind,
};
use tessera_sql::caster::cast;
use tessera_sql::{ColumnTypeMap, SchemaSnapshot, SqlBuilder, SqlType, SqlValue};

const KNOWN: [(&str, &str); 3] = [("status", "OPEN"), ("id", "42"), ("placed_on", "2024-04-09")];

fn schema() -> (SchemaSnapshot, ColumnTypeMap) {
    let mut columns = ColumnTypeMap::new();
    columns.insert("id".into(), SqlType::BigInt);
    columns.insert("status".into(), SqlType::Text);
    columns.insert("placed_on".into(), SqlType::Date);
    (SchemaSnapshot::single("orders", Arc::new(columns.clone())), columns)
}

fn select(conditions: Vec<QueryCondition>) -> QueryTemplate {
    let mut template = QueryTemplate::new(StatementKind::Select, "orders");
    template.selected_columns = vec![SelectedColumn::new("id")];
    template.conditions = conditions;
    template
}

#[test]
fn test_open_orders_select() {
    let (schema, _) = schema();
    let template = select(vec![QueryCondition::new(
        "status",
        QueryOperator::Equals,
        "OPEN",
    )]);

    let stmt = SqlBuilder::new(DatabaseProvider::PostgreSql, &schema)
        .select(&template)
        .unwrap();
    assert_eq!(stmt.named_sql(), "SELECT id FROM orders WHERE status = :status");
    assert_eq!(stmt.param("status"), Some(&SqlValue::Text("OPEN".into())));

    let (sql, args) = stmt.render(DatabaseProvider::PostgreSql);
    assert_eq!(sql, "SELECT id FROM orders WHERE status = $1");
    assert_eq!(args, vec![SqlValue::Text("OPEN".into())]);
}

proptest! {
    #[test]
    fn test_one_param_per_known_condition(
        picks in proptest::collection::vec((0usize..3, any::<bool>()), 0..8),
    ) {
        let (schema, columns) = schema();
        let conditions: Vec<QueryCondition> = picks
            .iter()
            .map(|(i, known)| {
                let (field, value) = KNOWN[*i];
                if *known {
                    QueryCondition::new(field, QueryOperator::Equals, value)
                } else {
                    QueryCondition::new(format!("{}_x", field), QueryOperator::Equals, value)
                }
            })
            .collect();
        let template = select(conditions.clone());

        let stmt = SqlBuilder::new(DatabaseProvider::MySql, &schema)
            .select(&template)
            .unwrap();

        let expected: Vec<SqlValue> = conditions
            .iter()
            .filter_map(|c| columns.get(&c.field).map(|t| cast(c.value.as_deref(), t).unwrap()))
            .collect();
        let bound: Vec<SqlValue> = stmt.params().values().cloned().collect();
        prop_assert_eq!(bound, expected.clone());

        let sql = stmt.named_sql();
        prop_assert!(!sql.contains("_x"));
        prop_assert_eq!(sql.contains(" WHERE "), !expected.is_empty());
    }
}
