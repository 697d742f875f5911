use crate::executor::Pool;
#[cfg(feature = "mssql")]
use crate::mssql::MsSqlExecutor;
use crate::mysql::MySqlExecutor;
#[cfg(feature = "oracle")]
use crate::oracle_db::OracleExecutor;
use crate::params::ConnectionTarget;
use crate::postgres::PostgresExecutor;
use crate::sqlite::SqliteExecutor;
use async_trait::async_trait;
use std::sync::Arc;
use tessera_common::config::PoolSettings;
use tessera_common::models::{DatabaseConfig, DatabaseProvider};
use tessera_error::{ErrorCode, ErrorContext, Result, TesseraError};
use tracing::info;

/// Which built-in driver serves a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Postgres,
    MySql,
    MsSql,
    /// Blocking driver behind the worker pool.
    Sqlite,
    /// Blocking driver behind the worker pool.
    Oracle,
}

impl DriverKind {
    /// `None` when the provider's driver was compiled out (`mssql` and `oracle` features).
    pub fn for_provider(provider: DatabaseProvider) -> Option<Self> {
        match provider {
            DatabaseProvider::PostgreSql => Some(Self::Postgres),
            DatabaseProvider::MySql | DatabaseProvider::MariaDb => Some(Self::MySql),
            DatabaseProvider::Sqlite => Some(Self::Sqlite),
            DatabaseProvider::MsSql => cfg!(feature = "mssql").then_some(Self::MsSql),
            DatabaseProvider::Oracle => cfg!(feature = "oracle").then_some(Self::Oracle),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Sqlite | Self::Oracle)
    }
}

/// Builds a pool for one connection config. The pool cache owns the caching; a factory
/// only constructs.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn build(&self, config: &DatabaseConfig) -> Result<Pool>;
}

/// Built-in drivers, sized from the config's own `maxPoolSize`/`minIdle` or the defaults.
#[derive(Debug, Clone, Default)]
pub struct DefaultPoolFactory {
    defaults: PoolSettings,
}

impl DefaultPoolFactory {
    pub fn new(defaults: PoolSettings) -> Self {
        Self { defaults }
    }
}

#[async_trait]
impl PoolFactory for DefaultPoolFactory {
    async fn build(&self, config: &DatabaseConfig) -> Result<Pool> {
        let kind = DriverKind::for_provider(config.provider).ok_or_else(|| {
            TesseraError::new(
                ErrorCode::UnsupportedProvider,
                format!("No driver available for provider {}.", config.provider),
            )
            .with_hint("Build tessera-connectors with the provider's driver feature enabled.")
            .with_context(connection_context(config))
        })?;

        let target = ConnectionTarget::from_config(config, &self.defaults)
            .map_err(|e| TesseraError::from(e).with_context(connection_context(config)))?;

        let pool: Pool = match kind {
            DriverKind::Postgres => Arc::new(PostgresExecutor::connect(&target)?) as Pool,
            DriverKind::MySql => Arc::new(MySqlExecutor::connect(config.provider, &target)?) as Pool,
            DriverKind::Sqlite => Arc::new(SqliteExecutor::connect(&target)?) as Pool,
            #[cfg(feature = "mssql")]
            DriverKind::MsSql => Arc::new(MsSqlExecutor::connect(&target)?) as Pool,
            #[cfg(feature = "oracle")]
            DriverKind::Oracle => Arc::new(OracleExecutor::connect(&target)?) as Pool,
            #[allow(unreachable_patterns)]
            DriverKind::MsSql | DriverKind::Oracle => {
                return Err(TesseraError::new(
                    ErrorCode::UnsupportedProvider,
                    format!("No driver available for provider {}.", config.provider),
                ))
            }
        };
        info!(
            target: "pool",
            config_id = %config.id,
            provider = %config.provider,
            blocking = kind.is_blocking(),
            max_size = target.max_size,
            "Built connection pool for '{}'",
            config.database_connection_name
        );
        Ok(pool)
    }
}

pub(crate) fn connection_context(config: &DatabaseConfig) -> ErrorContext {
    ErrorContext::Connection {
        config_id: config.id.clone(),
        provider: Some(config.provider.to_string()),
        host: config.param("host"),
    }
}
