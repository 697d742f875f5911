use super::SqlBuilder;
use crate::caster::cast;
use crate::sanitize::{column_key, validate_column_reference, validate_having_expression};
use crate::statement::BoundStatement;
use crate::types::{SqlType, SqlValue};
use tessera_common::models::{ChainOperator, QueryCondition, QueryOperator, QueryTemplate};
use tessera_common::validation::split_list_value;
use tessera_error::{Result, TesseraError};
use tracing::debug;

/// Which clause a condition list renders into.
#[derive(Clone, Copy)]
enum Clause {
    /// Values cast against the column type. Unknown columns are skipped; with `required`,
    /// a non-empty condition list that loses every entry is an error.
    Where {
        prefix: Option<&'static str>,
        required: bool,
    },
    /// Values bound as text. No metadata check.
    Having,
}

impl<'a> SqlBuilder<'a> {
    /// Appends ` WHERE ...` for the template's conditions over its base table. Nothing is
    /// appended when no condition survives the column check.
    pub(super) fn push_where(
        &self,
        stmt: &mut BoundStatement,
        template: &QueryTemplate,
        prefix: Option<&'static str>,
    ) -> Result<()> {
        self.push_conditions(
            stmt,
            " WHERE ",
            template,
            &template.conditions,
            Clause::Where {
                prefix,
                required: false,
            },
        )
    }

    /// Like [`push_where`](Self::push_where), for statements that modify rows. Conditions
    /// that all name unknown columns fail with `InvalidColumn` instead of widening the
    /// statement to the whole table.
    pub(super) fn push_filter(
        &self,
        stmt: &mut BoundStatement,
        template: &QueryTemplate,
        prefix: Option<&'static str>,
    ) -> Result<()> {
        self.push_conditions(
            stmt,
            " WHERE ",
            template,
            &template.conditions,
            Clause::Where {
                prefix,
                required: true,
            },
        )
    }

    pub(super) fn push_having(
        &self,
        stmt: &mut BoundStatement,
        template: &QueryTemplate,
    ) -> Result<()> {
        self.push_conditions(
            stmt,
            " HAVING ",
            template,
            &template.having_conditions,
            Clause::Having,
        )
    }

    fn push_conditions(
        &self,
        stmt: &mut BoundStatement,
        keyword: &str,
        template: &QueryTemplate,
        conditions: &[QueryCondition],
        clause: Clause,
    ) -> Result<()> {
        let columns = self.columns(&template.table_name);
        let mut previous: Option<ChainOperator> = None;
        let mut dropped: Option<&QueryCondition> = None;

        for condition in conditions {
            match clause {
                Clause::Where { .. } => validate_column_reference(&condition.field)?,
                Clause::Having => validate_having_expression(&condition.field)?,
            }
            let key = column_key(&condition.field);
            let sql_type = match clause {
                Clause::Where { .. } => match columns.get(&key) {
                    Some(t) => t.clone(),
                    None => {
                        debug!(
                            table = %template.table_name,
                            field = %condition.field,
                            "skipping condition on unknown column"
                        );
                        dropped.get_or_insert(condition);
                        continue;
                    }
                },
                Clause::Having => SqlType::Text,
            };
            let hint = match clause {
                Clause::Where { prefix, .. } => format!("{}{}", prefix.unwrap_or(""), key),
                Clause::Having => format!("having_{}", key),
            };

            match previous {
                None => stmt.push_sql(keyword),
                Some(chain) => stmt.push_sql(format!(" {} ", chain.as_sql())),
            };
            self.push_condition(stmt, condition, &sql_type, &hint)?;
            previous = Some(condition.chain);
        }

        if let (Clause::Where { required: true, .. }, None, Some(condition)) =
            (clause, previous, dropped)
        {
            return Err(TesseraError::invalid_column(
                condition.field.trim(),
                template.table_name.trim(),
                "WHERE",
                columns.keys().cloned(),
            ));
        }
        Ok(())
    }

    fn push_condition(
        &self,
        stmt: &mut BoundStatement,
        condition: &QueryCondition,
        sql_type: &SqlType,
        hint: &str,
    ) -> Result<()> {
        let field = condition.field.trim().to_lowercase();
        let op = condition.operator;

        if op.is_nullary() {
            stmt.push_sql(format!("{} {}", field, op.symbol()));
            return Ok(());
        }

        if op.is_list() {
            let items = split_list_value(condition.value.as_deref().unwrap_or(""));
            if items.len() > self.in_list_limit {
                return Err(TesseraError::template(format!(
                    "IN clause exceeds allowed limit ({} values max).",
                    self.in_list_limit
                )));
            }
            if items.is_empty() {
                // An empty IN matches nothing, an empty NOT IN matches everything.
                stmt.push_sql(if op == QueryOperator::In { "1 = 0" } else { "1 = 1" });
                return Ok(());
            }
            let values = items
                .iter()
                .map(|item| cast_for(&field, Some(item), sql_type))
                .collect::<Result<Vec<_>>>()?;
            stmt.push_sql(format!("{} {} (", field, op.symbol()));
            stmt.bind(hint, SqlValue::List(values));
            stmt.push_sql(")");
            return Ok(());
        }

        let value = if op == QueryOperator::Like {
            match condition.value.as_deref() {
                Some(v) if !v.is_empty() => SqlValue::Text(v.to_string()),
                _ => SqlValue::Null,
            }
        } else {
            cast_for(&field, condition.value.as_deref(), sql_type)?
        };
        stmt.push_sql(format!("{} {} ", field, op.symbol()));
        stmt.bind(hint, value);
        Ok(())
    }
}

fn cast_for(field: &str, value: Option<&str>, sql_type: &SqlType) -> Result<SqlValue> {
    cast(value, sql_type).map_err(|e| e.with_hint(format!("Check the value supplied for '{}'.", field)))
}
