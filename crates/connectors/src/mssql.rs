//! SQL Server driver over `tiberius`, pooled with `deadpool`.

use crate::error::DriverError;
use crate::executor::{metadata_error, statement_error, split_qualified, Row, SqlExecutor};
use crate::params::ConnectionTarget;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use deadpool::managed::{self, Metrics, Object, RecycleError, RecycleResult};
use deadpool::Runtime;
use serde_json::Value;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlValue};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

const DEFAULT_PORT: u16 = 1433;

const DESCRIBE_SQL: &str = "\
SELECT c.COLUMN_NAME, c.DATA_TYPE, c.CHARACTER_MAXIMUM_LENGTH, c.IS_NULLABLE, \
CAST(ep.value AS NVARCHAR(4000)) \
FROM INFORMATION_SCHEMA.COLUMNS c \
LEFT JOIN sys.extended_properties ep \
ON ep.major_id = OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)) \
AND ep.minor_id = COLUMNPROPERTY(ep.major_id, c.COLUMN_NAME, 'ColumnId') \
AND ep.name = 'MS_Description' \
WHERE c.TABLE_NAME = @P1 AND c.TABLE_SCHEMA = COALESCE(@P2, SCHEMA_NAME()) \
ORDER BY c.ORDINAL_POSITION";

type MsSqlClient = Client<Compat<TcpStream>>;

/// Opens TDS sessions for the pool.
pub struct MsSqlManager {
    config: Config,
}

impl managed::Manager for MsSqlManager {
    type Type = MsSqlClient;
    type Error = DriverError;

    async fn create(&self) -> std::result::Result<MsSqlClient, DriverError> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| DriverError::Connect(e.to_string()))?;
        Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))
    }

    async fn recycle(&self, client: &mut MsSqlClient, _: &Metrics) -> RecycleResult<DriverError> {
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| RecycleError::Backend(DriverError::Connect(e.to_string())))?
            .into_row()
            .await
            .map_err(|e| RecycleError::Backend(DriverError::Connect(e.to_string())))?;
        Ok(())
    }
}

type MsSqlPool = managed::Pool<MsSqlManager>;

pub struct MsSqlExecutor {
    pool: MsSqlPool,
}

impl MsSqlExecutor {
    pub fn connect(target: &ConnectionTarget) -> std::result::Result<Self, DriverError> {
        let mut config = Config::new();
        config.host(target.host_or_err()?);
        config.port(target.port.unwrap_or(DEFAULT_PORT));
        if let Some(database) = &target.database {
            config.database(database);
        }
        let username = target
            .username
            .as_deref()
            .ok_or_else(|| DriverError::InvalidParams("username is required".into()))?;
        config.authentication(AuthMethod::sql_server(
            username,
            target.password_str().unwrap_or_default(),
        ));
        if target.trust_server_certificate {
            config.trust_cert();
        }

        let pool = MsSqlPool::builder(MsSqlManager { config })
            .max_size(target.max_size)
            .wait_timeout(Some(target.acquire_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DriverError::Build(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> std::result::Result<Object<MsSqlManager>, DriverError> {
        Ok(self.pool.get().await?)
    }
}

fn bind<'a>(sql: &'a str, args: &[SqlValue]) -> Query<'a> {
    let mut query = Query::new(sql);
    for arg in args {
        match arg {
            SqlValue::Null | SqlValue::List(_) => query.bind(Option::<String>::None),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::BigInt(v) => query.bind(*v),
            SqlValue::Double(v) => query.bind(*v),
            SqlValue::Decimal(d) => query.bind(d.to_string()),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::Text(s) => query.bind(s.clone()),
        }
    }
    query
}

#[async_trait]
impl SqlExecutor for MsSqlExecutor {
    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::MsSql
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, args) = stmt.render(DatabaseProvider::MsSql);
        debug!(target: "queries", sql = %sql, params = args.len(), "mssql query");
        let mut client = self.client().await?;
        let rows = bind(&sql, &args)
            .query(&mut *client)
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?
            .into_first_result()
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?;
        Ok(rows.into_iter().map(decode_row).collect())
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        let (sql, args) = stmt.render(DatabaseProvider::MsSql);
        debug!(target: "queries", sql = %sql, params = args.len(), "mssql execute");
        let mut client = self.client().await?;
        let result = bind(&sql, &args)
            .execute(&mut *client)
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?;
        Ok(result.total())
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        let mut client = self.client().await?;
        client
            .simple_query(ddl)
            .await
            .map_err(|e| statement_error(DriverError::from(e), ddl))?
            .into_results()
            .await
            .map_err(|e| statement_error(DriverError::from(e), ddl))?;
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let mut client = self.client().await?;
        let mut query = Query::new(DESCRIBE_SQL);
        query.bind(name.to_string());
        query.bind(schema.map(str::to_string));
        let rows = query
            .query(&mut *client)
            .await
            .map_err(|e| metadata_error(DriverError::from(e), table))?
            .into_first_result()
            .await
            .map_err(|e| metadata_error(DriverError::from(e), table))?;

        rows.iter()
            .map(|row| describe_row(row).map_err(|e| metadata_error(DriverError::from(e), table)))
            .collect()
    }
}

fn describe_row(row: &tiberius::Row) -> tiberius::Result<ColumnInfo> {
    Ok(ColumnInfo {
        name: row.try_get::<&str, _>(0)?.unwrap_or_default().to_string(),
        data_type: row.try_get::<&str, _>(1)?.unwrap_or_default().to_string(),
        size: row.try_get::<i32, _>(2)?.map(i64::from),
        nullable: row
            .try_get::<&str, _>(3)?
            .is_some_and(|n| n.eq_ignore_ascii_case("YES")),
        remarks: row
            .try_get::<&str, _>(4)?
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    })
}

fn decode_row(row: tiberius::Row) -> Row {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    names
        .into_iter()
        .zip(row)
        .map(|(name, data)| (name, decode(&data)))
        .collect()
}

fn decode(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::String(g.to_string())).unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v.as_ref().map(|n| Value::String(n.to_string())).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::String(String::from_utf8_lossy(b).into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Date(_) => temporal::<NaiveDate>(data, |d| d.format("%Y-%m-%d").to_string()),
        ColumnData::Time(_) => temporal::<NaiveTime>(data, |t| t.format("%H:%M:%S%.f").to_string()),
        ColumnData::DateTimeOffset(_) => temporal::<DateTime<FixedOffset>>(data, |t| t.to_rfc3339()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<NaiveDateTime>(data, |t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        _ => Value::Null,
    }
}

fn temporal<'a, T: FromSql<'a>>(data: &'a ColumnData<'static>, render: impl Fn(T) -> String) -> Value {
    match T::from_sql(data) {
        Ok(Some(value)) => Value::String(render(value)),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_column_data_decodes_to_json() {
        assert_eq!(decode(&ColumnData::I32(Some(7))), Value::from(7));
        assert_eq!(decode(&ColumnData::I64(None)), Value::Null);
        assert_eq!(decode(&ColumnData::Bit(Some(true))), Value::Bool(true));
        assert_eq!(
            decode(&ColumnData::String(Some(Cow::Borrowed("OPEN")))),
            Value::String("OPEN".into())
        );
    }

    #[test]
    fn test_pool_builds_without_connecting() {
        let target = ConnectionTarget {
            host: Some("127.0.0.1".into()),
            port: Some(1),
            database: Some("sales".into()),
            username: Some("sa".into()),
            password: None,
            path: None,
            trust_server_certificate: true,
            max_size: 2,
            min_idle: 0,
            idle_timeout: std::time::Duration::from_secs(60),
            acquire_timeout: std::time::Duration::from_millis(100),
        };
        assert!(MsSqlExecutor::connect(&target).is_ok());

        let target = ConnectionTarget {
            username: None,
            ..target
        };
        assert!(matches!(
            MsSqlExecutor::connect(&target),
            Err(DriverError::InvalidParams(_))
        ));
    }
}
