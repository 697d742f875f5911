//! Structural checks for templates and connection configs.
//!
//! Store writes run the full checks. Statement builders reuse the join and CTE checks so a
//! template that bypassed the store still fails before any SQL is produced.

use crate::models::{DatabaseConfig, DatabaseProvider, JoinConfig, JoinKind, NamedQuery, QueryTemplate, StatementKind};
use std::collections::HashSet;
use tessera_error::{ErrorCode, ErrorContext, Result, TesseraError};
use tracing::warn;

const UNSAFE_KEYWORDS: [&str; 3] = ["DROP", "DELETE", "TRUNCATE"];

pub fn validate_template(template: &QueryTemplate, in_list_limit: usize) -> Result<()> {
    if template.template_name.trim().is_empty() {
        return Err(field_error(template, "templateName", "Template name must not be empty."));
    }
    if template.table_name.trim().is_empty() && template.statement_kind != StatementKind::Create {
        return Err(field_error(template, "tableName", "From table must be provided."));
    }
    if matches!(template.limit, Some(l) if l <= 0) {
        return Err(field_error(template, "limit", "Limit must be a positive number."));
    }
    if matches!(template.offset, Some(o) if o < 0) {
        return Err(field_error(template, "offset", "Offset cannot be negative."));
    }

    if template.statement_kind == StatementKind::Select && template.raw_sql().is_none() {
        if template.selected_columns.is_empty() {
            return Err(field_error(
                template,
                "selectedColumns",
                "At least one selected column must be provided.",
            ));
        }
        for column in &template.selected_columns {
            check_expression(template, &column.expression)?;
        }
    }

    if template.distinct && !template.group_by.is_empty() {
        warn!(
            template = %template.template_name,
            "DISTINCT used with GROUP BY; this may be redundant"
        );
    }

    validate_joins(&template.table_name, &template.joins)?;
    validate_ctes(&template.ctes)?;

    if !template.group_by.is_empty() && template.statement_kind == StatementKind::Select {
        let selected: HashSet<String> = template
            .selected_columns
            .iter()
            .map(|c| c.expression.trim().to_lowercase())
            .collect();
        for column in &template.group_by {
            if !selected.contains(&column.trim().to_lowercase()) {
                return Err(field_error(
                    template,
                    "groupBy",
                    format!("Group by column '{}' must be in selectedColumns.", column),
                ));
            }
        }
    }

    if !template.having_conditions.is_empty() && template.group_by.is_empty() {
        return Err(field_error(
            template,
            "havingConditions",
            "HAVING conditions require GROUP BY clause.",
        ));
    }

    for condition in &template.conditions {
        if condition.operator.is_list() {
            let count = condition
                .value
                .as_deref()
                .map(|v| split_list_value(v).len())
                .unwrap_or(0);
            if count > in_list_limit {
                return Err(field_error(
                    template,
                    "conditions",
                    format!("IN clause exceeds allowed limit ({} values max).", in_list_limit),
                ));
            }
        }
    }

    for union in &template.unions {
        validate_template(&union.template, in_list_limit).or_else(|e| {
            // Branch templates are not stored on their own and often carry no name.
            if e.message.starts_with("Template name") {
                Ok(())
            } else {
                Err(e)
            }
        })?;
    }
    Ok(())
}

pub fn validate_joins(base_table: &str, joins: &[JoinConfig]) -> Result<()> {
    let mut aliases = HashSet::new();
    aliases.insert(base_table.to_lowercase());

    for join in joins {
        if join.table.trim().is_empty() {
            return Err(TesseraError::template(
                "Join table is missing in one of the JOIN definitions.",
            ));
        }
        let on = join.on_condition.as_deref().map(str::trim).unwrap_or("");

        if join.kind == JoinKind::Cross {
            if !on.is_empty() {
                return Err(TesseraError::template("CROSS JOIN must not have an ON condition."));
            }
        } else {
            if on.is_empty() {
                return Err(TesseraError::template(format!(
                    "{} requires an ON condition with table '{}'.",
                    join.kind.as_sql(),
                    join.table
                )));
            }

            if join.table.eq_ignore_ascii_case(base_table) {
                let alias = join.alias.as_deref().map(str::trim).unwrap_or("");
                if alias.is_empty() {
                    return Err(TesseraError::template(format!(
                        "Self-join detected for table '{}'. Alias is required.",
                        join.table
                    )));
                }
                if alias.eq_ignore_ascii_case(base_table) {
                    return Err(TesseraError::template(
                        "Self-join alias cannot match base table name.",
                    ));
                }
            }
        }

        if let Some(alias) = join.alias.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            if !aliases.insert(alias.to_lowercase()) {
                return Err(TesseraError::template(format!(
                    "Duplicate table alias in JOINs: {}",
                    alias.to_lowercase()
                )));
            }
        }
    }
    Ok(())
}

pub fn validate_ctes(ctes: &[NamedQuery]) -> Result<()> {
    for cte in ctes {
        if cte.name.trim().is_empty() || cte.query.trim().is_empty() {
            return Err(TesseraError::template(
                "CTE block must have both 'name' and 'query'.",
            ));
        }
    }
    Ok(())
}

/// Required parameters: `url` (or `host`), `username` and `password`. SQLite only needs
/// a location.
pub fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.database_connection_name.trim().is_empty() {
        return Err(missing_param(config, "databaseConnectionName"));
    }
    if config.provider == DatabaseProvider::Sqlite {
        if config.param("url").is_none() && config.param("path").is_none() {
            return Err(missing_param(config, "url"));
        }
        return Ok(());
    }
    if config.param("url").is_none() && config.param("host").is_none() {
        return Err(missing_param(config, "url"));
    }
    for key in ["username", "password"] {
        if config.param(key).is_none() {
            return Err(missing_param(config, key));
        }
    }
    Ok(())
}

/// Splits an IN-list value. Accepts a JSON array or a comma-separated list.
pub fn split_list_value(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            return items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                })
                .collect();
        }
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_expression(template: &QueryTemplate, expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(field_error(
            template,
            "selectedColumns",
            "Selected column expression must not be empty.",
        ));
    }
    let upper = expression.to_uppercase();
    let has_keyword = upper
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| UNSAFE_KEYWORDS.contains(&word));
    if upper.contains(';') || has_keyword {
        return Err(field_error(
            template,
            "selectedColumns",
            format!("Unsafe expression detected in selected column: {}", expression),
        ));
    }
    Ok(())
}

fn field_error(template: &QueryTemplate, field: &str, message: impl Into<String>) -> TesseraError {
    TesseraError::template(message).with_context(ErrorContext::Template {
        template_id: Some(template.id.clone()).filter(|id| !id.is_empty()),
        field: Some(field.to_string()),
    })
}

fn missing_param(config: &DatabaseConfig, key: &str) -> TesseraError {
    TesseraError::new(
        ErrorCode::MissingRequiredField,
        format!("Database '{}' must be provided", key),
    )
    .with_context(ErrorContext::Config {
        file_path: None,
        field: Some(format!("{}.{}", config.database_connection_name, key)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionParams, QueryCondition, QueryOperator, SelectedColumn};

    fn select(table: &str) -> QueryTemplate {
        let mut t = QueryTemplate::new(StatementKind::Select, table);
        t.template_name = "t".into();
        t.selected_columns.push(SelectedColumn::new("id"));
        t
    }

    fn join(kind: JoinKind, table: &str, alias: Option<&str>, on: Option<&str>) -> JoinConfig {
        JoinConfig {
            kind,
            table: table.into(),
            alias: alias.map(Into::into),
            on_condition: on.map(Into::into),
        }
    }

    #[test]
    fn test_valid_select_passes() {
        assert!(validate_template(&select("orders"), 1000).is_ok());
    }

    #[test]
    fn test_unsafe_expression_rejected() {
        let mut t = select("orders");
        t.selected_columns.push(SelectedColumn::new("1; DROP TABLE orders"));
        let err = validate_template(&t, 1000).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateError);

        let mut ok = select("orders");
        ok.selected_columns.push(SelectedColumn::new("deleted_at"));
        assert!(validate_template(&ok, 1000).is_ok());
    }

    #[test]
    fn test_join_rules() {
        assert!(validate_joins("orders", &[join(JoinKind::Cross, "regions", None, Some("a = b"))]).is_err());
        assert!(validate_joins("orders", &[join(JoinKind::Left, "customers", Some("c"), None)]).is_err());
        assert!(validate_joins("orders", &[join(JoinKind::Inner, "orders", None, Some("o.id = orders.parent_id"))]).is_err());
        assert!(validate_joins("orders", &[join(JoinKind::Inner, "orders", Some("ORDERS"), Some("x"))]).is_err());
        assert!(validate_joins(
            "orders",
            &[
                join(JoinKind::Inner, "customers", Some("c"), Some("orders.customer_id = c.id")),
                join(JoinKind::Left, "contacts", Some("C"), Some("c.id = C.customer_id")),
            ]
        )
        .is_err());
        assert!(validate_joins(
            "orders",
            &[
                join(JoinKind::Inner, "orders", Some("parent"), Some("orders.parent_id = parent.id")),
                join(JoinKind::Cross, "regions", None, None),
            ]
        )
        .is_ok());
    }

    #[test]
    fn test_group_by_must_be_selected_and_having_needs_group_by() {
        let mut t = select("orders");
        t.group_by.push("status".into());
        assert!(validate_template(&t, 1000).is_err());

        let mut t = select("orders");
        t.having_conditions
            .push(QueryCondition::new("total", QueryOperator::GreaterThan, "5"));
        assert!(validate_template(&t, 1000).is_err());
    }

    #[test]
    fn test_in_list_cap() {
        let mut t = select("orders");
        t.conditions
            .push(QueryCondition::new("id", QueryOperator::In, "1,2,3"));
        assert!(validate_template(&t, 3).is_ok());
        assert!(validate_template(&t, 2).is_err());
    }

    #[test]
    fn test_split_list_value_formats() {
        assert_eq!(split_list_value("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list_value(r#"["x", 2, null]"#), vec!["x", "2"]);
        assert!(split_list_value("  ").is_empty());
    }

    #[test]
    fn test_config_requirements() {
        let mut params = ConnectionParams::new();
        params.insert("url".into(), "mysql://db/app".into());
        params.insert("username".into(), "app".into());
        let mut config = DatabaseConfig {
            id: "c".into(),
            database_connection_name: "main".into(),
            provider: DatabaseProvider::MySql,
            config: params,
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        };
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRequiredField);
        assert!(err.message.contains("password"));

        config.provider = DatabaseProvider::Sqlite;
        assert!(validate_config(&config).is_ok());
    }
}
