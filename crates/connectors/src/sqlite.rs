//! SQLite driver. `rusqlite` is blocking, so every call runs through `deadpool-sqlite`'s
//! `interact`, which hands the connection to the blocking worker pool.

use crate::error::DriverError;
use crate::executor::{declared_size, metadata_error, statement_error, split_qualified, Row, SqlExecutor};
use crate::params::ConnectionTarget;
use async_trait::async_trait;
use deadpool_sqlite::rusqlite::types::{Value as LiteValue, ValueRef};
use deadpool_sqlite::rusqlite::{self, params_from_iter};
use deadpool_sqlite::{Config, Pool, PoolConfig, Runtime};
use serde_json::Value;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlValue};
use tracing::debug;

const DESCRIBE_SQL: &str =
    "SELECT name, type, \"notnull\" FROM pragma_table_info(?1, ?2) ORDER BY cid";

pub struct SqliteExecutor {
    pool: Pool,
}

impl SqliteExecutor {
    pub fn connect(target: &ConnectionTarget) -> std::result::Result<Self, DriverError> {
        let path = target
            .path
            .as_deref()
            .or(target.database.as_deref())
            .ok_or_else(|| DriverError::InvalidParams("sqlite needs a url or path".into()))?;

        let mut config = Config::new(path);
        let mut pool_config = PoolConfig::new(target.max_size);
        pool_config.timeouts.wait = Some(target.acquire_timeout);
        config.pool = Some(pool_config);
        let pool = config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| DriverError::Build(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Runs `f` on a pooled connection on the blocking worker pool.
    async fn interact<T, F>(&self, sql: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.pool.get().await.map_err(DriverError::from)?;
        let result = conn.interact(f).await.map_err(DriverError::from)?;
        result.map_err(|e| statement_error(DriverError::from(e), sql))
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::Sqlite
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, args) = stmt.render(DatabaseProvider::Sqlite);
        debug!(target: "queries", sql = %sql, params = args.len(), "sqlite query");
        let values: Vec<LiteValue> = args.iter().map(to_sqlite).collect();
        let owned = sql.clone();
        self.interact(&sql, move |conn| {
            let mut stmt = conn.prepare_cached(&owned)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    record.insert(name.clone(), decode(row.get_ref(idx)?));
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        let (sql, args) = stmt.render(DatabaseProvider::Sqlite);
        debug!(target: "queries", sql = %sql, params = args.len(), "sqlite execute");
        let values: Vec<LiteValue> = args.iter().map(to_sqlite).collect();
        let owned = sql.clone();
        self.interact(&sql, move |conn| {
            let changed = conn.execute(&owned, params_from_iter(values))?;
            Ok(changed as u64)
        })
        .await
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        let owned = ddl.to_string();
        self.interact(ddl, move |conn| conn.execute_batch(&owned)).await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let name = name.to_string();
        let schema = schema.unwrap_or("main").to_string();
        self.interact(DESCRIBE_SQL, move |conn| {
            let mut stmt = conn.prepare_cached(DESCRIBE_SQL)?;
            let columns = stmt
                .query_map([&name, &schema], |row| {
                    let data_type: String = row.get(1)?;
                    let not_null: i64 = row.get(2)?;
                    Ok(ColumnInfo {
                        name: row.get(0)?,
                        size: declared_size(&data_type),
                        data_type,
                        nullable: not_null == 0,
                        remarks: None,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(columns)
        })
        .await
        .map_err(|e| metadata_error(e, table))
    }
}

fn to_sqlite(value: &SqlValue) -> LiteValue {
    match value {
        SqlValue::Null | SqlValue::List(_) => LiteValue::Null,
        SqlValue::Int(v) => LiteValue::Integer(i64::from(*v)),
        SqlValue::BigInt(v) => LiteValue::Integer(*v),
        SqlValue::Double(v) => LiteValue::Real(*v),
        SqlValue::Decimal(d) => LiteValue::Text(d.to_string()),
        SqlValue::Bool(b) => LiteValue::Integer(i64::from(*b)),
        SqlValue::Date(d) => LiteValue::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Timestamp(t) => LiteValue::Text(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SqlValue::Text(s) => LiteValue::Text(s.clone()),
    }
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
