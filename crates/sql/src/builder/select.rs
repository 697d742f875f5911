use super::{push_joins, table_name, SqlBuilder};
use crate::sanitize::column_key;
use crate::statement::BoundStatement;
use tessera_common::models::QueryTemplate;
use tessera_common::validation::{validate_ctes, validate_joins};
use tessera_error::{Result, TesseraError};

impl<'a> SqlBuilder<'a> {
    /// Full SELECT: CTE prologue, the base query, then any UNION branches.
    pub fn select(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        let mut stmt = BoundStatement::new();

        validate_ctes(&template.ctes)?;
        if !template.ctes.is_empty() {
            let ctes: Vec<String> = template
                .ctes
                .iter()
                .map(|cte| format!("{} AS ({})", cte.name.trim(), cte.query.trim()))
                .collect();
            stmt.push_sql(format!("WITH {} ", ctes.join(", ")));
        }

        self.push_single_select(&mut stmt, template)?;

        for union in &template.unions {
            stmt.push_sql(if union.union_all { " UNION ALL " } else { " UNION " });
            self.push_single_select(&mut stmt, &union.template)?;
        }
        Ok(stmt)
    }

    fn push_single_select(&self, stmt: &mut BoundStatement, template: &QueryTemplate) -> Result<()> {
        let table = table_name(template)?;
        validate_joins(table, &template.joins)?;

        stmt.push_sql(if template.distinct { "SELECT DISTINCT " } else { "SELECT " });

        let mut items: Vec<String> = template
            .selected_columns
            .iter()
            .map(|column| match column.alias.as_deref().map(str::trim) {
                Some(alias) if !alias.is_empty() => {
                    format!("{} AS {}", column.expression.trim(), alias)
                }
                _ => column.expression.trim().to_string(),
            })
            .collect();
        for sub in &template.subqueries {
            if sub.name.trim().is_empty() || sub.query.trim().is_empty() {
                return Err(TesseraError::template(
                    "Subquery must have both name and query.",
                ));
            }
            items.push(format!("({}) AS {}", sub.query.trim(), sub.name.trim()));
        }
        if items.is_empty() {
            stmt.push_sql("*");
        } else {
            stmt.push_sql(items.join(", "));
        }

        stmt.push_sql(format!(" FROM {}", table));
        push_joins(stmt, &template.joins);
        self.push_where(stmt, template, None)?;

        if !template.group_by.is_empty() {
            let columns = self.columns(table);
            for field in &template.group_by {
                if !columns.contains_key(&column_key(field)) {
                    return Err(TesseraError::invalid_column(
                        field.trim(),
                        table,
                        "GROUP BY",
                        columns.keys().cloned(),
                    ));
                }
            }
            let fields: Vec<&str> = template.group_by.iter().map(|f| f.trim()).collect();
            stmt.push_sql(format!(" GROUP BY {}", fields.join(", ")));
        }

        self.push_having(stmt, template)?;

        if !template.order_by.is_empty() {
            let order: Vec<String> = template
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column.trim(), direction.as_sql()))
                .collect();
            stmt.push_sql(format!(" ORDER BY {}", order.join(", ")));
        }

        stmt.push_sql(self.dialect.pagination(
            template.limit,
            template.offset,
            !template.order_by.is_empty(),
        ));
        Ok(())
    }
}
