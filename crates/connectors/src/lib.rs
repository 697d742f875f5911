//! Database access for Tessera.
//!
//! - **Executors**: the [`SqlExecutor`] trait and its PostgreSQL, MySQL/MariaDB, SQL Server,
//!   SQLite and Oracle drivers. SQLite and Oracle are blocking and run on the worker pool.
//! - **Pools**: [`PoolCache`] builds pools through a [`PoolFactory`] and rebuilds them when
//!   a config's parameters change.
//! - **Metadata**: [`MetadataCache`] holds column types per (config hash, table).
pub mod error;
pub mod executor;
pub mod factory;
pub mod metadata;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle_db;
pub mod params;
pub mod pool;
pub mod postgres;
pub mod sqlite;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::DriverError;
pub use executor::{Pool, Row, SqlExecutor};
pub use factory::{DefaultPoolFactory, DriverKind, PoolFactory};
pub use metadata::MetadataCache;
pub use pool::{CachedPool, PoolCache};
