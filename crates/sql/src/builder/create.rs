use super::SqlBuilder;
use crate::sanitize::validate_identifier;
use tessera_common::models::{
    ColumnDefinition, ConstraintType, CreateTableBlock, DatabaseProvider, QueryTemplate,
    TableConstraint,
};
use tessera_error::{Result, TesseraError};

impl<'a> SqlBuilder<'a> {
    /// DDL for a CREATE template: the literal statement when present, otherwise generated
    /// from the structured create-table block.
    pub fn create(&self, template: &QueryTemplate) -> Result<String> {
        if let Some(ddl) = template
            .ddl_statement
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(ddl.to_string());
        }
        match &template.create_table {
            Some(block) => self.create_table(block, &template.table_name),
            None => Err(TesseraError::template(
                "DDL statement must be provided for CREATE.",
            )),
        }
    }

    fn create_table(&self, block: &CreateTableBlock, fallback_table: &str) -> Result<String> {
        let table = block
            .table_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_table.trim());
        validate_identifier(table)?;
        if block.columns.is_empty() {
            return Err(TesseraError::template(
                "CREATE TABLE requires at least one column.",
            ));
        }

        let inline_pk = block.columns.iter().filter(|c| c.primary_key).count() == 1
            && !block
                .constraints
                .iter()
                .any(|c| c.kind == ConstraintType::PrimaryKey);

        let mut definitions = Vec::with_capacity(block.columns.len() + block.constraints.len());
        for column in &block.columns {
            definitions.push(self.column_definition(column, inline_pk)?);
        }

        let flagged: Vec<String> = block
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.trim().to_string())
            .collect();
        if !inline_pk && !flagged.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", flagged.join(", ")));
        }
        for constraint in &block.constraints {
            definitions.push(constraint_definition(constraint)?);
        }

        let mut ddl = String::from("CREATE ");
        if block.temporary {
            ddl.push_str("TEMPORARY ");
        }
        ddl.push_str("TABLE ");
        if block.if_not_exists {
            ddl.push_str("IF NOT EXISTS ");
        }
        ddl.push_str(&format!("{} ({})", table, definitions.join(", ")));

        if let Some(comment) = block.table_comment.as_deref().filter(|c| !c.is_empty()) {
            if self.dialect.supports_comments() {
                ddl.push_str(&format!(" COMMENT = {}", quote_literal(comment)));
            }
        }
        Ok(ddl)
    }

    fn column_definition(&self, column: &ColumnDefinition, inline_pk: bool) -> Result<String> {
        validate_identifier(&column.name)?;
        let data_type = column.data_type.trim();
        if data_type.is_empty() || data_type.contains(';') {
            return Err(TesseraError::template(format!(
                "Column '{}' needs a valid data type.",
                column.name
            )));
        }

        let sqlite = self.provider == DatabaseProvider::Sqlite;
        let mut def = format!("{} {}", column.name.trim(), data_type);
        if column.auto_increment && !sqlite {
            def.push(' ');
            def.push_str(self.dialect.auto_increment());
        }
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default_value {
            def.push_str(&format!(" DEFAULT {}", self.default_literal(default)));
        }
        if column.unique {
            def.push_str(" UNIQUE");
        }
        if column.primary_key && inline_pk {
            def.push_str(" PRIMARY KEY");
            // SQLite only accepts AUTOINCREMENT right after an inline primary key.
            if column.auto_increment && sqlite {
                def.push(' ');
                def.push_str(self.dialect.auto_increment());
            }
        }
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            if self.dialect.supports_comments() {
                def.push_str(&format!(" COMMENT {}", quote_literal(comment)));
            }
        }
        Ok(def)
    }

    fn default_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => match self.provider {
                DatabaseProvider::Oracle | DatabaseProvider::MsSql => {
                    (if *b { "1" } else { "0" }).to_string()
                }
                _ => b.to_string().to_uppercase(),
            },
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => quote_literal(s),
            other => quote_literal(&other.to_string()),
        }
    }
}

fn constraint_definition(constraint: &TableConstraint) -> Result<String> {
    for column in constraint
        .columns
        .iter()
        .chain(constraint.reference_columns.iter())
    {
        validate_identifier(column)?;
    }
    let columns = constraint
        .columns
        .iter()
        .map(|c| c.trim())
        .collect::<Vec<_>>()
        .join(", ");
    let needs_columns = |kind: &str| -> Result<()> {
        if constraint.columns.is_empty() {
            return Err(TesseraError::template(format!(
                "{} constraint requires columns.",
                kind
            )));
        }
        Ok(())
    };

    let body = match constraint.kind {
        ConstraintType::PrimaryKey => {
            needs_columns("PRIMARY KEY")?;
            format!("PRIMARY KEY ({})", columns)
        }
        ConstraintType::Unique => {
            needs_columns("UNIQUE")?;
            format!("UNIQUE ({})", columns)
        }
        ConstraintType::ForeignKey => {
            needs_columns("FOREIGN KEY")?;
            let reference = constraint
                .reference_table
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    TesseraError::template("FOREIGN KEY constraint requires a reference table.")
                })?;
            validate_identifier(reference)?;
            let mut body = format!("FOREIGN KEY ({}) REFERENCES {}", columns, reference);
            if !constraint.reference_columns.is_empty() {
                let referenced: Vec<&str> =
                    constraint.reference_columns.iter().map(|c| c.trim()).collect();
                body.push_str(&format!(" ({})", referenced.join(", ")));
            }
            body
        }
        ConstraintType::Check => {
            let condition = constraint
                .check_condition
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| TesseraError::template("CHECK constraint requires a condition."))?;
            if condition.contains(';') {
                return Err(TesseraError::template("CHECK condition must not contain ';'."));
            }
            format!("CHECK ({})", condition)
        }
    };

    match constraint.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            validate_identifier(name)?;
            Ok(format!("CONSTRAINT {} {}", name, body))
        }
        None => Ok(body),
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
