//! Oracle driver. The `oracle` crate is blocking: its session pool is created on first use
//! and every call runs on the blocking worker pool through `spawn_blocking`.

use crate::error::DriverError;
use crate::executor::{metadata_error, statement_error, split_qualified, Row, SqlExecutor};
use crate::params::ConnectionTarget;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::pool::{GetMode, Pool, PoolBuilder};
use oracle::sql_type::{OracleType, ToSql};
use oracle::Connection;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlValue};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 1521;

const DESCRIBE_SQL: &str = "\
SELECT c.COLUMN_NAME, c.DATA_TYPE, \
CASE WHEN c.CHAR_LENGTH > 0 THEN c.CHAR_LENGTH ELSE c.DATA_PRECISION END, \
c.NULLABLE, m.COMMENTS \
FROM ALL_TAB_COLUMNS c \
LEFT JOIN ALL_COL_COMMENTS m \
ON m.OWNER = c.OWNER AND m.TABLE_NAME = c.TABLE_NAME AND m.COLUMN_NAME = c.COLUMN_NAME \
WHERE c.TABLE_NAME = UPPER(:1) \
AND c.OWNER = COALESCE(UPPER(:2), SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA')) \
ORDER BY c.COLUMN_ID";

struct SessionSettings {
    username: String,
    password: SecretString,
    connect_string: String,
    max_size: u32,
    min_idle: u32,
    acquire_timeout: Duration,
}

pub struct OracleExecutor {
    settings: Arc<SessionSettings>,
    pool: OnceCell<Arc<Pool>>,
}

impl OracleExecutor {
    pub fn connect(target: &ConnectionTarget) -> std::result::Result<Self, DriverError> {
        let host = target.host_or_err()?;
        let service = target.database.as_deref().ok_or_else(|| {
            DriverError::InvalidParams("oracle needs a service name or SID".into())
        })?;
        let username = target
            .username
            .clone()
            .ok_or_else(|| DriverError::InvalidParams("username is required".into()))?;
        let max_size = u32::try_from(target.max_size).unwrap_or(u32::MAX);

        Ok(Self {
            settings: Arc::new(SessionSettings {
                username,
                password: target
                    .password
                    .clone()
                    .unwrap_or_else(|| SecretString::from(String::new())),
                connect_string: connect_string(host, target.port, service),
                max_size,
                min_idle: u32::try_from(target.min_idle).unwrap_or(0).min(max_size),
                acquire_timeout: target.acquire_timeout,
            }),
            pool: OnceCell::new(),
        })
    }

    /// The session pool, created on the worker pool by the first caller.
    async fn pool(&self) -> std::result::Result<&Arc<Pool>, DriverError> {
        self.pool
            .get_or_try_init(|| {
                let settings = self.settings.clone();
                async move {
                    let pool = tokio::task::spawn_blocking(move || {
                        PoolBuilder::new(
                            settings.username.as_str(),
                            settings.password.expose_secret(),
                            settings.connect_string.as_str(),
                        )
                        .min_connections(settings.min_idle)
                        .max_connections(settings.max_size)
                        .get_mode(GetMode::TimedWait(settings.acquire_timeout))
                        .build()
                    })
                    .await?
                    .map_err(|e| DriverError::Connect(e.to_string()))?;
                    info!(target: "pool", "Created Oracle session pool");
                    Ok::<_, DriverError>(Arc::new(pool))
                }
            })
            .await
    }

    /// Runs `f` on a pooled session on the blocking worker pool.
    async fn interact<T, F>(&self, sql: &str, f: F) -> std::result::Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> oracle::Result<T> + Send + 'static,
    {
        let pool = self.pool().await?.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DriverError::Checkout(e.to_string()))?;
            conn.set_autocommit(true);
            f(&conn).map_err(DriverError::from)
        })
        .await?;
        if let Err(err) = &result {
            debug!(target: "queries", sql = %sql, error = %err, "oracle call failed");
        }
        result
    }
}

fn connect_string(host: &str, port: Option<u16>, service: &str) -> String {
    format!("//{}:{}/{}", host, port.unwrap_or(DEFAULT_PORT), service)
}

fn to_oracle(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null | SqlValue::List(_) => Box::new(Option::<String>::None),
        SqlValue::Int(v) => Box::new(*v),
        SqlValue::BigInt(v) => Box::new(*v),
        SqlValue::Double(v) => Box::new(*v),
        SqlValue::Decimal(d) => Box::new(d.to_string()),
        SqlValue::Bool(b) => Box::new(i64::from(*b)),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Timestamp(t) => Box::new(*t),
        SqlValue::Text(s) => Box::new(s.clone()),
    }
}

fn bind_values(args: &[SqlValue]) -> Vec<Box<dyn ToSql>> {
    args.iter().map(to_oracle).collect()
}

fn as_params(values: &[Box<dyn ToSql>]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v.as_ref()).collect()
}

#[async_trait]
impl SqlExecutor for OracleExecutor {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::Oracle
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, args) = stmt.render(DatabaseProvider::Oracle);
        debug!(target: "queries", sql = %sql, params = args.len(), "oracle query");
        let owned = sql.clone();
        self.interact(&sql, move |conn| {
            let values = bind_values(&args);
            let rows = conn.query(&owned, &as_params(&values))?;
            let columns: Vec<(String, OracleType)> = rows
                .column_info()
                .iter()
                .map(|c| (c.name().to_string(), c.oracle_type().clone()))
                .collect();
            let mut out = Vec::new();
            for row in rows {
                let row = row?;
                let mut record = Row::new();
                for (idx, (name, oracle_type)) in columns.iter().enumerate() {
                    record.insert(name.clone(), decode(&row, idx, oracle_type)?);
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
        .map_err(|e| statement_error(e, &sql))
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        let (sql, args) = stmt.render(DatabaseProvider::Oracle);
        debug!(target: "queries", sql = %sql, params = args.len(), "oracle execute");
        let owned = sql.clone();
        self.interact(&sql, move |conn| {
            let values = bind_values(&args);
            conn.execute(&owned, &as_params(&values))?.row_count()
        })
        .await
        .map_err(|e| statement_error(e, &sql))
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        let owned = ddl.to_string();
        self.interact(ddl, move |conn| conn.execute(&owned, &[]).map(|_| ()))
            .await
            .map_err(|e| statement_error(e, ddl))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let name = name.to_string();
        let schema = schema.map(str::to_string);
        self.interact(DESCRIBE_SQL, move |conn| {
            let rows = conn.query(DESCRIBE_SQL, &[&name as &dyn ToSql, &schema])?;
            let mut columns = Vec::new();
            for row in rows {
                let row = row?;
                let nullable: String = row.get(3)?;
                columns.push(ColumnInfo {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    size: row.get::<_, Option<i64>>(2)?,
                    nullable: nullable.eq_ignore_ascii_case("Y"),
                    remarks: row.get::<_, Option<String>>(4)?.filter(|r| !r.is_empty()),
                });
            }
            Ok(columns)
        })
        .await
        .map_err(|e| metadata_error(e, table))
    }

    async fn ping(&self) -> Result<()> {
        self.interact("ping", |conn| conn.ping())
            .await
            .map_err(|e| DriverError::Connect(e.to_string()).into())
    }
}

fn decode(row: &oracle::Row, idx: usize, oracle_type: &OracleType) -> oracle::Result<Value> {
    Ok(match oracle_type {
        OracleType::Number(_, 0) | OracleType::Int64 => row
            .get::<_, Option<i64>>(idx)
            .map(|v| v.map(Value::from))
            .or_else(|_| row.get::<_, Option<String>>(idx).map(|v| v.map(Value::String)))?
            .unwrap_or(Value::Null),
        OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<_, Option<f64>>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        OracleType::Date | OracleType::Timestamp(_) => row
            .get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => row
            .get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        _ => row
            .get::<_, Option<String>>(idx)?
            .map(Value::String)
            .unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ConnectionTarget {
        ConnectionTarget {
            host: Some("ora.internal".into()),
            port: None,
            database: Some("ORCLPDB1".into()),
            username: Some("app".into()),
            password: Some(SecretString::from("secret".to_string())),
            path: None,
            trust_server_certificate: false,
            max_size: 4,
            min_idle: 10,
            idle_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_session_settings_from_target() {
        let executor = OracleExecutor::connect(&target()).unwrap();
        assert_eq!(executor.settings.connect_string, "//ora.internal:1521/ORCLPDB1");
        assert_eq!(executor.settings.max_size, 4);
        assert_eq!(executor.settings.min_idle, 4);
        assert!(executor.pool.get().is_none());
    }

    #[test]
    fn test_service_name_required() {
        let target = ConnectionTarget {
            database: None,
            ..target()
        };
        assert!(matches!(
            OracleExecutor::connect(&target),
            Err(DriverError::InvalidParams(_))
        ));
    }
}
