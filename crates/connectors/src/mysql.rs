//! MySQL and MariaDB driver over `mysql_async`.

use crate::error::DriverError;
use crate::executor::{metadata_error, statement_error, split_qualified, Row, SqlExecutor};
use crate::params::ConnectionTarget;
use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Value as MyValue};
use serde_json::Value;
use tessera_common::models::{ColumnInfo, DatabaseProvider};
use tessera_error::Result;
use tessera_sql::{BoundStatement, SqlValue};
use tracing::debug;

const DEFAULT_PORT: u16 = 3306;

const DESCRIBE_SQL: &str = "\
SELECT COLUMN_NAME, COLUMN_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE, COLUMN_COMMENT \
FROM information_schema.COLUMNS \
WHERE TABLE_NAME = ? AND TABLE_SCHEMA = COALESCE(?, DATABASE()) \
ORDER BY ORDINAL_POSITION";

pub struct MySqlExecutor {
    provider: DatabaseProvider,
    pool: Pool,
}

impl MySqlExecutor {
    pub fn connect(
        provider: DatabaseProvider,
        target: &ConnectionTarget,
    ) -> std::result::Result<Self, DriverError> {
        let constraints = PoolConstraints::new(target.min_idle.min(target.max_size), target.max_size)
            .ok_or_else(|| {
                DriverError::InvalidParams(format!(
                    "minIdle {} exceeds maxPoolSize {}",
                    target.min_idle, target.max_size
                ))
            })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_inactive_connection_ttl(target.idle_timeout);

        let opts = OptsBuilder::default()
            .ip_or_hostname(target.host_or_err()?)
            .tcp_port(target.port.unwrap_or(DEFAULT_PORT))
            .user(target.username.clone())
            .pass(target.password_str().map(str::to_string))
            .db_name(target.database.clone())
            .pool_opts(pool_opts);

        Ok(Self {
            provider,
            pool: Pool::new(opts),
        })
    }

    async fn conn(&self) -> std::result::Result<Conn, DriverError> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))
    }
}

fn params(args: &[SqlValue]) -> Params {
    if args.is_empty() {
        Params::Empty
    } else {
        Params::Positional(args.iter().map(to_mysql).collect())
    }
}

#[async_trait]
impl SqlExecutor for MySqlExecutor {
    fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        let (sql, args) = stmt.render(self.provider);
        debug!(target: "queries", sql = %sql, params = args.len(), "mysql query");
        let mut conn = self.conn().await?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(sql.as_str(), params(&args))
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        let (sql, args) = stmt.render(self.provider);
        debug!(target: "queries", sql = %sql, params = args.len(), "mysql execute");
        let mut conn = self.conn().await?;
        conn.exec_drop(sql.as_str(), params(&args))
            .await
            .map_err(|e| statement_error(DriverError::from(e), &sql))?;
        Ok(conn.affected_rows())
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.query_drop(ddl)
            .await
            .map_err(|e| statement_error(DriverError::from(e), ddl))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let mut conn = self.conn().await?;
        let rows: Vec<(String, String, Option<u64>, String, Option<String>)> = conn
            .exec(
                DESCRIBE_SQL,
                Params::Positional(vec![MyValue::from(name), MyValue::from(schema)]),
            )
            .await
            .map_err(|e| metadata_error(DriverError::from(e), table))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, size, nullable, remarks)| ColumnInfo {
                name,
                data_type,
                size: size.and_then(|s| i64::try_from(s).ok()),
                nullable: nullable.eq_ignore_ascii_case("YES"),
                remarks: remarks.filter(|r| !r.is_empty()),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.ping().await.map_err(|e| DriverError::Connect(e.to_string()).into())
    }
}

fn to_mysql(value: &SqlValue) -> MyValue {
    match value {
        SqlValue::Null | SqlValue::List(_) => MyValue::NULL,
        SqlValue::Int(v) => MyValue::Int(i64::from(*v)),
        SqlValue::BigInt(v) => MyValue::Int(*v),
        SqlValue::Double(v) => MyValue::Double(*v),
        SqlValue::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
        SqlValue::Bool(b) => MyValue::Int(i64::from(*b)),
        SqlValue::Date(d) => MyValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::Timestamp(t) => MyValue::Date(
            t.year() as u16,
            t.month() as u8,
            t.day() as u8,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        SqlValue::Text(s) => MyValue::Bytes(s.clone().into_bytes()),
    }
}

fn decode_row(row: &mysql_async::Row) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = row
            .as_ref(idx)
            .map(|v| decode_value(v, column.column_type()))
            .unwrap_or(Value::Null);
        out.insert(column.name_str().into_owned(), value);
    }
    out
}

fn decode_value(value: &MyValue, column_type: ColumnType) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::from(*i),
        MyValue::UInt(u) => Value::from(*u),
        MyValue::Float(f) => Value::from(f64::from(*f)),
        MyValue::Double(d) => Value::from(*d),
        MyValue::Bytes(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if column_type == ColumnType::MYSQL_TYPE_JSON {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        MyValue::Date(y, mo, d, h, mi, s, us) => {
            if column_type == ColumnType::MYSQL_TYPE_DATE {
                Value::String(format!("{:04}-{:02}-{:02}", y, mo, d))
            } else if *us > 0 {
                Value::String(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
                    y, mo, d, h, mi, s, us
                ))
            } else {
                Value::String(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
                    y, mo, d, h, mi, s
                ))
            }
        }
        MyValue::Time(negative, days, h, mi, s, _) => {
            let hours = days * 24 + u32::from(*h);
            let sign = if *negative { "-" } else { "" };
            Value::String(format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_values_convert_for_binding() {
        assert_eq!(to_mysql(&SqlValue::Bool(true)), MyValue::Int(1));
        assert_eq!(
            to_mysql(&SqlValue::Date(NaiveDate::from_ymd_opt(2024, 4, 9).unwrap())),
            MyValue::Date(2024, 4, 9, 0, 0, 0, 0)
        );
        assert_eq!(
            to_mysql(&SqlValue::Text("OPEN".into())),
            MyValue::Bytes(b"OPEN".to_vec())
        );
    }

    #[test]
    fn test_dates_decode_as_iso_text() {
        let date = MyValue::Date(2024, 4, 9, 0, 0, 0, 0);
        assert_eq!(
            decode_value(&date, ColumnType::MYSQL_TYPE_DATE),
            Value::String("2024-04-09".into())
        );
        let ts = MyValue::Date(2024, 4, 9, 13, 5, 7, 0);
        assert_eq!(
            decode_value(&ts, ColumnType::MYSQL_TYPE_DATETIME),
            Value::String("2024-04-09T13:05:07".into())
        );
        let json = MyValue::Bytes(br#"{"a":1}"#.to_vec());
        assert_eq!(
            decode_value(&json, ColumnType::MYSQL_TYPE_JSON),
            serde_json::json!({"a": 1})
        );
    }
}
