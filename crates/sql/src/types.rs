//! SQL column types and bindable values.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Column type as far as parameter casting is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// TINYINT, SMALLINT, INTEGER and friends. Binds as 32 bit.
    Integer,
    BigInt,
    /// FLOAT, REAL, DOUBLE.
    Double,
    /// NUMERIC, DECIMAL.
    Decimal,
    /// BOOLEAN, BIT.
    Boolean,
    Date,
    /// TIMESTAMP with or without zone, DATETIME.
    Timestamp,
    /// CHAR, VARCHAR, TEXT.
    Text,
    /// Anything else. Values pass through as trimmed text.
    Other(String),
}

impl SqlType {
    /// Maps a catalog type name (`int4`, `VARCHAR(20)`, `timestamp without time zone`,
    /// `tinyint(1)`, ...) to a [`SqlType`].
    pub fn from_catalog(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        // MySQL reports BOOLEAN columns as tinyint(1).
        if lower.starts_with("tinyint(1)") {
            return Self::Boolean;
        }
        let base = lower
            .split('(')
            .next()
            .unwrap_or_default()
            .trim_end_matches(" unsigned")
            .trim();

        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "int2" | "int4"
            | "serial" | "smallserial" => Self::Integer,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            "float" | "float4" | "float8" | "real" | "double" | "double precision" => Self::Double,
            "numeric" | "decimal" | "number" | "money" => Self::Decimal,
            "bool" | "boolean" | "bit" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" | "timestamptz" | "datetime" | "datetime2" | "smalldatetime"
            | "timestamp without time zone" | "timestamp with time zone" => Self::Timestamp,
            "char" | "character" | "varchar" | "character varying" | "nvarchar" | "nchar"
            | "text" | "tinytext" | "mediumtext" | "longtext" | "varchar2" | "nvarchar2"
            | "clob" | "bpchar" | "string" => Self::Text,
            _ => Self::Other(base.to_string()),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::Double => f.write_str("DOUBLE"),
            Self::Decimal => f.write_str("DECIMAL"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Date => f.write_str("DATE"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Text => f.write_str("VARCHAR"),
            Self::Other(name) => write!(f, "{}", name.to_uppercase()),
        }
    }
}

/// A typed value ready to bind. `List` expands to one placeholder per element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts a result cell or untyped JSON value, without any column type to guide it.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::BigInt(i)
                } else {
                    Self::Double(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{}", v),
            Self::BigInt(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Date(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "'{}'", v),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// Lower-cased column name to type, for one table.
pub type ColumnTypeMap = HashMap<String, SqlType>;

static EMPTY_COLUMNS: LazyLock<ColumnTypeMap> = LazyLock::new(HashMap::new);

/// Column maps for every table a statement touches, keyed by lower-cased table name.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    tables: HashMap<String, Arc<ColumnTypeMap>>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(table: &str, columns: Arc<ColumnTypeMap>) -> Self {
        let mut snapshot = Self::new();
        snapshot.insert(table, columns);
        snapshot
    }

    pub fn insert(&mut self, table: &str, columns: Arc<ColumnTypeMap>) {
        self.tables.insert(table.trim().to_lowercase(), columns);
    }

    /// Columns of `table`, or an empty map for tables that were not loaded.
    pub fn columns(&self, table: &str) -> &ColumnTypeMap {
        self.tables
            .get(&table.trim().to_lowercase())
            .map(|c| c.as_ref())
            .unwrap_or(&EMPTY_COLUMNS)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(&table.trim().to_lowercase())
    }
}
