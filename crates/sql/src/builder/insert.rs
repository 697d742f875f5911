use super::{returning_clause, table_name, validate_identifiers, SqlBuilder};
use crate::caster::cast_json;
use crate::sanitize::{column_key, validate_identifier};
use crate::statement::BoundStatement;
use crate::types::SqlValue;
use tessera_common::models::{QueryTemplate, ValueMap};
use tessera_error::{Result, TesseraError};
use tracing::warn;

impl<'a> SqlBuilder<'a> {
    pub fn insert(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        if template.use_merge {
            return Err(TesseraError::unsupported("MERGE INSERT is not supported."));
        }
        let table = table_name(template)?;
        let mut stmt = BoundStatement::new();

        if template.use_replace && !self.dialect.supports_replace() {
            warn!(
                provider = %self.provider,
                table = %table,
                "REPLACE INTO is not available for this provider; using INSERT INTO"
            );
        }
        let head = if template.use_replace && self.dialect.supports_replace() {
            "REPLACE INTO"
        } else {
            "INSERT INTO"
        };
        stmt.push_sql(format!("{} {}", head, table));

        if template.insert_from_select {
            validate_identifiers(&template.insert_columns)?;
            let query = template
                .subqueries
                .first()
                .map(|sub| sub.query.trim())
                .filter(|q| !q.is_empty())
                .ok_or_else(|| {
                    TesseraError::template("Insert-from-select requires a SELECT subquery.")
                })?;
            if !template.insert_columns.is_empty() {
                let columns: Vec<&str> = template.insert_columns.iter().map(|c| c.trim()).collect();
                stmt.push_sql(format!(" ({})", columns.join(", ")));
            }
            stmt.push_sql(format!(" {}", query));
        } else {
            if template.insert_values.is_empty() {
                return Err(TesseraError::template("Insert values must be provided."));
            }
            validate_identifiers(template.insert_values.keys())?;
            let columns: Vec<&str> = template.insert_values.keys().map(|c| c.trim()).collect();
            stmt.push_sql(format!(" ({}) VALUES (", columns.join(", ")));
            for (i, (column, value)) in template.insert_values.iter().enumerate() {
                if i > 0 {
                    stmt.push_sql(", ");
                }
                let value = self.cast_column_value(table, column, value)?;
                stmt.bind(&format!("val_{}", column_key(column)), value);
            }
            stmt.push_sql(")");
        }

        self.push_conflict_clause(&mut stmt, template, table)?;

        if !template.returning_fields.is_empty() && self.dialect.supports_returning() {
            validate_identifiers(&template.returning_fields)?;
            stmt.push_sql(returning_clause(&template.returning_fields));
        }
        Ok(stmt)
    }

    /// The follow-up read that stands in for RETURNING where the provider has none.
    /// `None` when no emulation is needed or possible.
    ///
    /// Rows are matched on every inserted value, so the result is only exact when those
    /// values identify the row.
    pub fn returning_select(&self, template: &QueryTemplate) -> Result<Option<BoundStatement>> {
        if template.returning_fields.is_empty()
            || self.dialect.supports_returning()
            || template.insert_from_select
            || template.insert_values.is_empty()
        {
            return Ok(None);
        }
        let table = table_name(template)?;
        validate_identifiers(&template.returning_fields)?;

        let fields: Vec<&str> = template.returning_fields.iter().map(|f| f.trim()).collect();
        let mut stmt = BoundStatement::new();
        stmt.push_sql(format!("SELECT {} FROM {} WHERE ", fields.join(", "), table));

        for (i, (column, value)) in template.insert_values.iter().enumerate() {
            if i > 0 {
                stmt.push_sql(" AND ");
            }
            let value = self.cast_column_value(table, column, value)?;
            if value.is_null() {
                stmt.push_sql(format!("{} IS NULL", column.trim()));
            } else {
                stmt.push_sql(format!("{} = ", column.trim()));
                stmt.bind(&format!("ret_{}", column_key(column)), value);
            }
        }
        Ok(Some(stmt))
    }

    fn push_conflict_clause(
        &self,
        stmt: &mut BoundStatement,
        template: &QueryTemplate,
        table: &str,
    ) -> Result<()> {
        if template.conflict_columns.is_empty() {
            return Ok(());
        }
        validate_identifiers(&template.conflict_columns)?;

        if self.dialect.supports_on_conflict() {
            let conflict: Vec<&str> = template.conflict_columns.iter().map(|c| c.trim()).collect();
            stmt.push_sql(format!(" ON CONFLICT ({})", conflict.join(", ")));
            if template.upsert_values.is_empty() {
                stmt.push_sql(" DO NOTHING");
            } else {
                stmt.push_sql(" DO UPDATE SET ");
                self.push_assignments(stmt, table, &template.upsert_values, "upsert_")?;
            }
            Ok(())
        } else if self.dialect.supports_on_duplicate_key() {
            if !template.upsert_values.is_empty() {
                stmt.push_sql(" ON DUPLICATE KEY UPDATE ");
                self.push_assignments(stmt, table, &template.upsert_values, "upsert_")?;
            }
            Ok(())
        } else {
            Err(TesseraError::unsupported(format!(
                "Conflict handling is not supported for {}.",
                self.provider
            )))
        }
    }

    /// `col = :prefix_col, ...` with values cast against the column type when known.
    pub(super) fn push_assignments(
        &self,
        stmt: &mut BoundStatement,
        table: &str,
        values: &ValueMap,
        prefix: &str,
    ) -> Result<()> {
        for (i, (column, value)) in values.iter().enumerate() {
            validate_identifier(column)?;
            if i > 0 {
                stmt.push_sql(", ");
            }
            let value = self.cast_column_value(table, column, value)?;
            stmt.push_sql(format!("{} = ", column.trim()));
            stmt.bind(&format!("{}{}", prefix, column_key(column)), value);
        }
        Ok(())
    }

    fn cast_column_value(
        &self,
        table: &str,
        column: &str,
        value: &serde_json::Value,
    ) -> Result<SqlValue> {
        let sql_type = self.columns(table).get(&column_key(column));
        cast_json(value, sql_type)
            .map_err(|e| e.with_hint(format!("Check the value supplied for '{}'.", column.trim())))
    }
}
