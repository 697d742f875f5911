//! Template and connection-config models shared by every Tessera crate.
//!
//! Field names serialize in camelCase so templates authored for the template store
//! (YAML or JSON) read the same on every side of the RPC boundary.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PRIMARY_KEY: &str = "id";

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_true() -> bool {
    true
}

/// Statement kind of a template. Drives strategy dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOperator {
    #[serde(alias = "=")]
    Equals,
    #[serde(alias = ">")]
    GreaterThan,
    #[serde(alias = "<")]
    LessThan,
    #[serde(alias = ">=")]
    GreaterThanEqual,
    #[serde(alias = "<=")]
    LessThanEqual,
    #[serde(alias = "!=", alias = "<>")]
    NotEqual,
    Like,
    In,
    #[serde(alias = "NOT IN")]
    NotIn,
    #[serde(alias = "IS NULL")]
    IsNull,
    #[serde(alias = "IS NOT NULL")]
    IsNotNull,
}

impl QueryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanEqual => ">=",
            Self::LessThanEqual => "<=",
            Self::NotEqual => "!=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that compare against no value.
    pub fn is_nullary(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainOperator {
    #[default]
    And,
    Or,
}

impl ChainOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One filter predicate. The value always travels as text and is cast at bind time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCondition {
    #[serde(alias = "fieldName")]
    pub field: String,
    #[serde(default)]
    pub value: Option<String>,
    pub operator: QueryOperator,
    /// Chains this condition to the next one.
    #[serde(default, alias = "filterOperator")]
    pub chain: ChainOperator,
}

impl QueryCondition {
    pub fn new(field: impl Into<String>, operator: QueryOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
            operator,
            chain: ChainOperator::And,
        }
    }

    pub fn or(mut self) -> Self {
        self.chain = ChainOperator::Or;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedColumn {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl SelectedColumn {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            alias: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    #[serde(alias = "joinType")]
    pub kind: JoinKind,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_condition: Option<String>,
}

/// A name plus raw query. Used for both CTEs and derived-table subqueries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionQuery {
    pub template: Box<QueryTemplate>,
    #[serde(default)]
    pub union_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    PrimaryKey,
    ForeignKey,
    Unique,
    Check,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_table: Option<String>,
    #[serde(default)]
    pub reference_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableBlock {
    #[serde(default)]
    pub if_not_exists: bool,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_comment: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub constraints: Vec<TableConstraint>,
}

/// Column-to-value map. Insertion order is the column order of the generated SQL.
pub type ValueMap = IndexMap<String, serde_json::Value>;

/// The provider-agnostic description of one SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTemplate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(alias = "queryType")]
    pub statement_kind: StatementKind,
    #[serde(default)]
    pub table_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_columns: Vec<SelectedColumn>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<QueryCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub having_conditions: Vec<QueryCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub order_by: IndexMap<String, SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctes: Vec<NamedQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subqueries: Vec<NamedQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unions: Vec<UnionQuery>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub updated_values: ValueMap,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub insert_values: ValueMap,
    #[serde(default)]
    pub insert_from_select: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub upsert_values: ValueMap,
    #[serde(default)]
    pub use_replace: bool,
    #[serde(default)]
    pub use_merge: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returning_fields: Vec<String>,

    /// Literal SQL that bypasses statement assembly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub delete_with_join: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_table_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddl_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_table: Option<CreateTableBlock>,

    #[serde(default = "default_primary_key")]
    pub primary_key_field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl QueryTemplate {
    pub fn new(kind: StatementKind, table: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            template_name: String::new(),
            created_by: None,
            statement_kind: kind,
            table_name: table.into(),
            selected_columns: Vec::new(),
            distinct: false,
            conditions: Vec::new(),
            having_conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: IndexMap::new(),
            limit: None,
            offset: None,
            joins: Vec::new(),
            ctes: Vec::new(),
            subqueries: Vec::new(),
            unions: Vec::new(),
            updated_values: ValueMap::new(),
            insert_values: ValueMap::new(),
            insert_from_select: false,
            insert_columns: Vec::new(),
            conflict_columns: Vec::new(),
            upsert_values: ValueMap::new(),
            use_replace: false,
            use_merge: false,
            returning_fields: Vec::new(),
            sql_query: None,
            delete_with_join: false,
            delete_table_alias: None,
            ddl_statement: None,
            create_table: None,
            primary_key_field: default_primary_key(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns a copy whose conditions are fully replaced by `overrides`.
    pub fn with_conditions(&self, overrides: Vec<QueryCondition>) -> Self {
        let mut copy = self.clone();
        copy.conditions = overrides;
        copy
    }

    pub fn raw_sql(&self) -> Option<&str> {
        self.sql_query
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn primary_key(&self) -> &str {
        let pk = self.primary_key_field.trim();
        if pk.is_empty() {
            DEFAULT_PRIMARY_KEY
        } else {
            pk
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseProvider {
    #[serde(alias = "mysql")]
    MySql,
    #[serde(alias = "postgresql", alias = "POSTGRES", alias = "postgres")]
    PostgreSql,
    #[serde(alias = "oracle")]
    Oracle,
    #[serde(alias = "mssql", alias = "SQLSERVER")]
    MsSql,
    #[serde(alias = "mariadb")]
    MariaDb,
    #[serde(alias = "sqlite")]
    Sqlite,
}

impl DatabaseProvider {
    pub const ALL: [DatabaseProvider; 6] = [
        Self::MySql,
        Self::PostgreSql,
        Self::Oracle,
        Self::MsSql,
        Self::MariaDb,
        Self::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "MYSQL",
            Self::PostgreSql => "POSTGRESQL",
            Self::Oracle => "ORACLE",
            Self::MsSql => "MSSQL",
            Self::MariaDb => "MARIADB",
            Self::Sqlite => "SQLITE",
        }
    }

    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Self::MySql | Self::MariaDb)
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MYSQL" => Ok(Self::MySql),
            "POSTGRESQL" | "POSTGRES" => Ok(Self::PostgreSql),
            "ORACLE" => Ok(Self::Oracle),
            "MSSQL" | "SQLSERVER" => Ok(Self::MsSql),
            "MARIADB" => Ok(Self::MariaDb),
            "SQLITE" => Ok(Self::Sqlite),
            other => Err(format!("Unsupported database provider: {}", other)),
        }
    }
}

/// Free-form connection parameters. Sorted keys keep the content hash stable.
pub type ConnectionParams = BTreeMap<String, serde_json::Value>;

/// Connection configuration for one database, owned by the external config store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default)]
    pub id: String,
    pub database_connection_name: String,
    pub provider: DatabaseProvider,
    #[serde(default)]
    pub config: ConnectionParams,
    #[serde(default = "default_true", alias = "isActive")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_fallback_config: Option<ConnectionParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl DatabaseConfig {
    /// Reads a connection parameter as text. Numbers and booleans are rendered.
    pub fn param(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.param(key).and_then(|v| v.parse().ok())
    }

    pub fn secret(&self, key: &str) -> Option<SecretString> {
        self.param(key).map(SecretString::from)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: BTreeMap<&String, &serde_json::Value> = self
            .config
            .iter()
            .filter(|(k, _)| !k.to_ascii_lowercase().contains("password"))
            .collect();
        f.debug_struct("DatabaseConfig")
            .field("id", &self.id)
            .field("database_connection_name", &self.database_connection_name)
            .field("provider", &self.provider)
            .field("config", &redacted)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// One column as reported by catalog introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_from_camel_case_json() {
        let json = r#"{
            "id": "t1",
            "templateName": "open_orders",
            "queryType": "SELECT",
            "tableName": "orders",
            "selectedColumns": [{"expression": "id"}],
            "conditions": [{"fieldName": "status", "operator": "EQUALS", "value": "OPEN", "filterOperator": "OR"}],
            "orderBy": {"created_at": "DESC", "id": "ASC"}
        }"#;
        let template: QueryTemplate = serde_json::from_str(json).unwrap();

        assert_eq!(template.statement_kind, StatementKind::Select);
        assert_eq!(template.conditions[0].field, "status");
        assert_eq!(template.conditions[0].chain, ChainOperator::Or);
        assert_eq!(template.primary_key(), "id");
        let keys: Vec<&String> = template.order_by.keys().collect();
        assert_eq!(keys, vec!["created_at", "id"]);
    }

    #[test]
    fn test_operator_symbol_aliases() {
        let op: QueryOperator = serde_json::from_str(r#""NOT IN""#).unwrap();
        assert_eq!(op, QueryOperator::NotIn);
        let op: QueryOperator = serde_json::from_str(r#"">=""#).unwrap();
        assert_eq!(op.symbol(), ">=");
        assert!(QueryOperator::IsNull.is_nullary());
    }

    #[test]
    fn test_with_conditions_copies() {
        let mut template = QueryTemplate::new(StatementKind::Select, "orders");
        template
            .conditions
            .push(QueryCondition::new("status", QueryOperator::Equals, "OPEN"));

        let replaced = template.with_conditions(vec![QueryCondition::new(
            "id",
            QueryOperator::GreaterThan,
            "10",
        )]);
        assert_eq!(template.conditions[0].field, "status");
        assert_eq!(replaced.conditions.len(), 1);
        assert_eq!(replaced.conditions[0].field, "id");
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "postgres".parse::<DatabaseProvider>().unwrap(),
            DatabaseProvider::PostgreSql
        );
        assert!("db2".parse::<DatabaseProvider>().is_err());
        let p: DatabaseProvider = serde_json::from_str(r#""MARIADB""#).unwrap();
        assert!(p.is_mysql_family());
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let mut params = ConnectionParams::new();
        params.insert("url".into(), "mysql://db:3306/app".into());
        params.insert("password".into(), "hunter2".into());
        params.insert("port".into(), serde_json::json!(3306));
        let config = DatabaseConfig {
            id: "c1".into(),
            database_connection_name: "app".into(),
            provider: DatabaseProvider::MySql,
            config: params,
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        };

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert_eq!(config.param("port").as_deref(), Some("3306"));
        assert_eq!(config.param_u64("port"), Some(3306));
    }
}
