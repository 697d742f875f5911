//! Parameter-bound SQL statements.
//!
//! A [`BoundStatement`] keeps SQL text and named parameters apart. The text is only ever
//! assembled from template structure; every user-supplied value lives in the parameter map
//! and reaches the driver as a bind argument.

use crate::dialect::capabilities;
use crate::types::SqlValue;
use indexmap::IndexMap;
use serde::Serialize;
use tessera_common::models::DatabaseProvider;

#[derive(Debug, Clone, PartialEq, Serialize)]
enum Fragment {
    Sql(String),
    Param(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundStatement {
    fragments: Vec<Fragment>,
    params: IndexMap<String, SqlValue>,
}

impl BoundStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// A statement with no parameters (DDL, raw overrides).
    pub fn raw(sql: impl Into<String>) -> Self {
        let mut stmt = Self::new();
        stmt.push_sql(sql.into());
        stmt
    }

    pub fn push_sql(&mut self, sql: impl AsRef<str>) -> &mut Self {
        let sql = sql.as_ref();
        if sql.is_empty() {
            return self;
        }
        match self.fragments.last_mut() {
            Some(Fragment::Sql(last)) => last.push_str(sql),
            _ => self.fragments.push(Fragment::Sql(sql.to_string())),
        }
        self
    }

    /// Binds `value` under a name derived from `hint` and appends its placeholder.
    /// Repeated hints get `_2`, `_3`, ... suffixes. Returns the name used.
    pub fn bind(&mut self, hint: &str, value: SqlValue) -> String {
        let base = param_name(hint);
        let mut name = base.clone();
        let mut n = 2;
        while self.params.contains_key(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.params.insert(name.clone(), value);
        self.fragments.push(Fragment::Param(name.clone()));
        name
    }

    pub fn params(&self) -> &IndexMap<String, SqlValue> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        self.params.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// SQL with `:name` placeholders. Used for logs and assertions.
    pub fn named_sql(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Sql(sql) => sql.clone(),
                Fragment::Param(name) => format!(":{}", name),
            })
            .collect()
    }

    /// Renders positional placeholders for `provider` and returns the arguments in order.
    /// List parameters expand to one placeholder per element.
    pub fn render(&self, provider: DatabaseProvider) -> (String, Vec<SqlValue>) {
        let dialect = capabilities(provider);
        let mut sql = String::new();
        let mut args = Vec::with_capacity(self.params.len());

        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(text) => sql.push_str(text),
                Fragment::Param(name) => {
                    let value = self.params.get(name).cloned().unwrap_or(SqlValue::Null);
                    match value {
                        SqlValue::List(items) => {
                            let mut placeholders = Vec::with_capacity(items.len());
                            for item in items {
                                args.push(item);
                                placeholders.push(dialect.placeholder(args.len()));
                            }
                            sql.push_str(&placeholders.join(", "));
                        }
                        scalar => {
                            args.push(scalar);
                            sql.push_str(&dialect.placeholder(args.len()));
                        }
                    }
                }
            }
        }
        (sql, args)
    }
}

fn param_name(hint: &str) -> String {
    let name: String = hint
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        "p".to_string()
    } else {
        name
    }
}
