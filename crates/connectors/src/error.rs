use thiserror::Error;
use tessera_error::{ErrorCode, TesseraError};

/// Failures raised inside a driver before they are mapped onto [`TesseraError`] codes.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid connection parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to build connection pool: {0}")]
    Build(String),

    #[error("Could not connect: {0}")]
    Connect(String),

    #[error("Timed out waiting for a pooled connection: {0}")]
    Checkout(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] deadpool_sqlite::rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    MsSql(#[from] tiberius::error::Error),

    #[cfg(feature = "oracle")]
    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::Error),

    #[error("Blocking worker failed: {0}")]
    Worker(String),
}

impl DriverError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParams(_) => ErrorCode::InvalidConnectionString,
            Self::Build(_) => ErrorCode::PoolBuildFailed,
            Self::Connect(_) => ErrorCode::ConnectionFailed,
            Self::Checkout(_) => ErrorCode::PoolExhausted,
            Self::Postgres(_) | Self::MySql(_) | Self::Sqlite(_) => ErrorCode::StatementFailed,
            #[cfg(feature = "mssql")]
            Self::MsSql(_) => ErrorCode::StatementFailed,
            #[cfg(feature = "oracle")]
            Self::Oracle(_) => ErrorCode::StatementFailed,
            Self::Worker(_) => ErrorCode::WorkerFailed,
        }
    }
}

impl From<DriverError> for TesseraError {
    fn from(err: DriverError) -> Self {
        TesseraError::new(err.code(), err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for DriverError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => Self::Connect(e.to_string()),
            deadpool_postgres::PoolError::Timeout(t) => Self::Checkout(format!("{:?}", t)),
            other => Self::Connect(other.to_string()),
        }
    }
}

impl From<deadpool_sqlite::PoolError> for DriverError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        match err {
            deadpool_sqlite::PoolError::Timeout(t) => Self::Checkout(format!("{:?}", t)),
            other => Self::Connect(other.to_string()),
        }
    }
}

impl From<deadpool_sqlite::InteractError> for DriverError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(feature = "mssql")]
impl From<deadpool::managed::PoolError<DriverError>> for DriverError {
    fn from(err: deadpool::managed::PoolError<DriverError>) -> Self {
        match err {
            deadpool::managed::PoolError::Backend(e) => e,
            deadpool::managed::PoolError::Timeout(t) => Self::Checkout(format!("{:?}", t)),
            other => Self::Connect(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for DriverError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_errors_map_to_codes() {
        let err: TesseraError = DriverError::InvalidParams("missing url".into()).into();
        assert_eq!(err.code, ErrorCode::InvalidConnectionString);
        assert!(err.message.contains("missing url"));

        let err: TesseraError = DriverError::Checkout("Wait".into()).into();
        assert_eq!(err.code, ErrorCode::PoolExhausted);
        assert!(!err.is_build_error());
    }
}
