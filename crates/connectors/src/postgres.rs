//! PostgreSQL driver over `deadpool-postgres`.

use crate::error::DriverError;
use crate::executor::{metadata_error, statement_error, split_qualified, Row, SqlExecutor};
use crate::params::ConnectionTarget;
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlValue};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::NoTls;
use tracing::debug;

const DEFAULT_PORT: u16 = 5432;

const DESCRIBE_SQL: &str = "\
SELECT column_name::text, data_type::text, character_maximum_length::int4, \
(is_nullable = 'YES') AS nullable, \
col_description(format('%I.%I', table_schema, table_name)::regclass, ordinal_position::int4) \
FROM information_schema.columns \
WHERE table_name::text = $1::text AND table_schema::text = COALESCE($2::text, current_schema()::text) \
ORDER BY ordinal_position";

pub struct PostgresExecutor {
    pool: Pool,
}

impl PostgresExecutor {
    pub fn connect(target: &ConnectionTarget) -> std::result::Result<Self, DriverError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(target.host_or_err()?)
            .port(target.port.unwrap_or(DEFAULT_PORT))
            .connect_timeout(target.acquire_timeout);
        if let Some(db) = &target.database {
            config.dbname(db);
        }
        if let Some(user) = &target.username {
            config.user(user);
        }
        if let Some(password) = target.password_str() {
            config.password(password);
        }

        let manager = Manager::from_config(
            config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(target.max_size)
            .wait_timeout(Some(target.acquire_timeout))
            .create_timeout(Some(target.acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DriverError::Build(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> std::result::Result<deadpool_postgres::Object, DriverError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::PostgreSql
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, args) = stmt.render(DatabaseProvider::PostgreSql);
        debug!(target: "queries", sql = %sql, params = args.len(), "postgres query");
        let client = self.client().await?;
        let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
        let rows = client
            .query(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        let (sql, args) = stmt.render(DatabaseProvider::PostgreSql);
        debug!(target: "queries", sql = %sql, params = args.len(), "postgres execute");
        let client = self.client().await?;
        let params: Vec<PgParam<'_>> = args.iter().map(PgParam).collect();
        client
            .execute(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .batch_execute(ddl)
            .await
            .map_err(|e| statement_error(DriverError::from(e), ddl))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let client = self.client().await?;
        let rows = client
            .query(DESCRIBE_SQL, &[&name, &schema])
            .await
            .map_err(|e| metadata_error(DriverError::from(e), table))?;

        rows.iter()
            .map(|row| -> std::result::Result<ColumnInfo, tokio_postgres::Error> {
                Ok(ColumnInfo {
                    name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    size: row.try_get::<_, Option<i32>>(2)?.map(i64::from),
                    nullable: row.try_get(3)?,
                    remarks: row.try_get(4)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| metadata_error(DriverError::from(e), table))
    }
}

fn param_refs<'a>(params: &'a [PgParam<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Binds a [`SqlValue`] to whatever parameter type the server inferred for its placeholder.
#[derive(Debug)]
struct PgParam<'a>(&'a SqlValue);

type ToSqlResult = std::result::Result<IsNull, Box<dyn Error + Sync + Send>>;

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Int(v) => int_to_sql(i64::from(*v), ty, out),
            SqlValue::BigInt(v) => int_to_sql(*v, ty, out),
            SqlValue::Double(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_f64(*v)
                    .ok_or("value out of NUMERIC range")?
                    .to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            SqlValue::Decimal(d) => match *ty {
                Type::FLOAT8 => d.to_f64().ok_or("value out of FLOAT8 range")?.to_sql(ty, out),
                Type::FLOAT4 => d.to_f32().ok_or("value out of FLOAT4 range")?.to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => d.to_string().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Date(d) => d.to_sql(ty, out),
            SqlValue::Timestamp(t) => match *ty {
                Type::TIMESTAMPTZ => Utc.from_utc_datetime(t).to_sql(ty, out),
                Type::DATE => t.date().to_sql(ty, out),
                _ => t.to_sql(ty, out),
            },
            SqlValue::Text(s) => match *ty {
                Type::JSON | Type::JSONB => serde_json::from_str::<Value>(s)
                    .unwrap_or_else(|_| Value::String(s.clone()))
                    .to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            SqlValue::List(_) => Err("list parameters must be expanded before binding".into()),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

fn cell<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

fn decode_row(row: &tokio_postgres::Row) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = match *column.type_() {
            Type::BOOL => cell::<bool>(row, idx).map(Value::from),
            Type::INT2 => cell::<i16>(row, idx).map(Value::from),
            Type::INT4 => cell::<i32>(row, idx).map(Value::from),
            Type::INT8 => cell::<i64>(row, idx).map(Value::from),
            Type::FLOAT4 => cell::<f32>(row, idx).map(|v| Value::from(f64::from(v))),
            Type::FLOAT8 => cell::<f64>(row, idx).map(Value::from),
            Type::NUMERIC => cell::<Decimal>(row, idx).map(|d| Value::String(d.to_string())),
            Type::DATE => cell::<NaiveDate>(row, idx).map(|d| Value::String(d.to_string())),
            Type::TIMESTAMP => cell::<NaiveDateTime>(row, idx)
                .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            Type::TIMESTAMPTZ => {
                cell::<DateTime<Utc>>(row, idx).map(|t| Value::String(t.to_rfc3339()))
            }
            Type::JSON | Type::JSONB => cell::<Value>(row, idx),
            _ => cell::<String>(row, idx).map(Value::String),
        };
        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    out
}
