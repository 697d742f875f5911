//! Statement assembly from query templates.
//!
//! One [`SqlBuilder`] serves one execution: it holds the provider's capabilities and the
//! column maps loaded for the tables involved. Each statement kind lives in its own module.

mod conditions;
mod create;
mod delete;
mod insert;
mod select;
mod update;

use crate::dialect::{capabilities, DialectCapabilities};
use crate::sanitize::validate_identifier;
use crate::statement::BoundStatement;
use crate::types::{ColumnTypeMap, SchemaSnapshot};
use tessera_common::config::DEFAULT_IN_LIST_LIMIT;
use tessera_common::models::{DatabaseProvider, JoinConfig, JoinKind, QueryTemplate};
use tessera_common::validation::validate_joins;
use tessera_error::Result;

pub struct SqlBuilder<'a> {
    provider: DatabaseProvider,
    dialect: &'static dyn DialectCapabilities,
    schema: &'a SchemaSnapshot,
    in_list_limit: usize,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(provider: DatabaseProvider, schema: &'a SchemaSnapshot) -> Self {
        Self {
            provider,
            dialect: capabilities(provider),
            schema,
            in_list_limit: DEFAULT_IN_LIST_LIMIT,
        }
    }

    pub fn with_in_list_limit(mut self, limit: usize) -> Self {
        self.in_list_limit = limit;
        self
    }

    pub fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    pub fn dialect(&self) -> &'static dyn DialectCapabilities {
        self.dialect
    }

    fn columns(&self, table: &str) -> &ColumnTypeMap {
        self.schema.columns(table)
    }

    /// `SELECT DISTINCT table.pk FROM table <joins> [WHERE ...]`, the first phase of join
    /// emulation for UPDATE and DELETE.
    pub fn key_select(&self, template: &QueryTemplate) -> Result<BoundStatement> {
        let table = table_name(template)?;
        let pk = template.primary_key();
        validate_identifier(pk)?;
        validate_joins(table, &template.joins)?;

        let mut stmt = BoundStatement::new();
        stmt.push_sql(format!("SELECT DISTINCT {}.{} FROM {}", table, pk, table));
        push_joins(&mut stmt, &template.joins);
        self.push_filter(&mut stmt, template, Some("where_"))?;
        Ok(stmt)
    }
}

fn table_name(template: &QueryTemplate) -> Result<&str> {
    let table = template.table_name.trim();
    validate_identifier(table)?;
    Ok(table)
}

fn push_joins(stmt: &mut BoundStatement, joins: &[JoinConfig]) {
    for join in joins {
        stmt.push_sql(format!(" {} {}", join.kind.as_sql(), join.table.trim()));
        if let Some(alias) = join.alias.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            stmt.push_sql(format!(" {}", alias));
        }
        if join.kind != JoinKind::Cross {
            if let Some(on) = join.on_condition.as_deref() {
                stmt.push_sql(format!(" ON {}", on.trim()));
            }
        }
    }
}

fn validate_identifiers<'s>(names: impl IntoIterator<Item = &'s String>) -> Result<()> {
    for name in names {
        validate_identifier(name)?;
    }
    Ok(())
}

fn returning_clause(fields: &[String]) -> String {
    let trimmed: Vec<&str> = fields.iter().map(|f| f.trim()).collect();
    format!(" RETURNING {}", trimmed.join(", "))
}
