//! Connection parameters read from a [`DatabaseConfig`] parameter map.
//!
//! Recognized keys: `url` (a `jdbc:` prefix is accepted and stripped), `host`, `port`,
//! `database`, `username`, `password`, `path` (SQLite), `maxPoolSize`, `minIdle`,
//! `trustServerCertificate` (MSSQL).
//!
//! Besides ordinary URLs, the SQL Server form `sqlserver://host:port;databaseName=x` and
//! the Oracle thin forms `oracle:thin:@//host:port/service` and `oracle:thin:@host:port:SID`
//! are understood.

use crate::error::DriverError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tessera_common::config::PoolSettings;
use tessera_common::models::DatabaseConfig;
use url::Url;

#[derive(Debug)]
pub struct ConnectionTarget {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// SQLite database file.
    pub path: Option<String>,
    pub trust_server_certificate: bool,
    pub max_size: usize,
    pub min_idle: usize,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl ConnectionTarget {
    pub fn from_config(config: &DatabaseConfig, defaults: &PoolSettings) -> Result<Self, DriverError> {
        let mut target = Self {
            host: config.param("host"),
            port: match config.param("port") {
                Some(p) => Some(p.parse().map_err(|_| {
                    DriverError::InvalidParams(format!("port '{}' is not a valid port", p))
                })?),
                None => None,
            },
            database: config.param("database"),
            username: config.param("username").or_else(|| config.param("user")),
            password: config.secret("password"),
            path: config.param("path"),
            trust_server_certificate: config
                .param("trustServerCertificate")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            max_size: config
                .param_u64("maxPoolSize")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_size)
                .max(1),
            min_idle: config
                .param_u64("minIdle")
                .map(|n| n as usize)
                .unwrap_or(defaults.min_idle),
            idle_timeout: Duration::from_secs(defaults.idle_timeout_secs),
            acquire_timeout: Duration::from_millis(defaults.acquire_timeout_ms),
        };

        if let Some(raw) = config.param("url") {
            target.apply_url(&raw)?;
        }
        Ok(target)
    }

    /// Fills unset fields from a connection URL. Explicit parameters win over the URL.
    fn apply_url(&mut self, raw: &str) -> Result<(), DriverError> {
        let stripped = raw.trim().strip_prefix("jdbc:").unwrap_or(raw.trim());

        if let Some(rest) = stripped.strip_prefix("sqlite:") {
            if self.path.is_none() {
                let path = rest.trim_start_matches("//");
                if path.is_empty() {
                    return Err(DriverError::InvalidParams("sqlite url has no path".into()));
                }
                self.path = Some(path.to_string());
            }
            return Ok(());
        }
        if let Some(rest) = stripped.strip_prefix("oracle:thin:@") {
            return self.apply_oracle_descriptor(rest);
        }

        let mut properties = Vec::new();
        let stripped = match stripped.split_once(';') {
            Some((head, props)) if stripped.starts_with("sqlserver:") => {
                properties = props
                    .split(';')
                    .filter_map(|p| p.split_once('='))
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .collect();
                head
            }
            _ => stripped,
        };
        for (key, value) in properties {
            match key.to_ascii_lowercase().as_str() {
                "databasename" | "database" if self.database.is_none() => self.database = Some(value),
                "user" if self.username.is_none() => self.username = Some(value),
                "password" if self.password.is_none() => {
                    self.password = Some(SecretString::from(value))
                }
                "trustservercertificate" => {
                    self.trust_server_certificate |= value.eq_ignore_ascii_case("true")
                }
                _ => {}
            }
        }

        let url = Url::parse(stripped)
            .map_err(|e| DriverError::InvalidParams(format!("invalid url: {}", e)))?;
        if self.host.is_none() {
            self.host = url.host_str().map(str::to_string);
        }
        if self.port.is_none() {
            self.port = url.port();
        }
        if self.database.is_none() {
            let db = url.path().trim_start_matches('/');
            if !db.is_empty() {
                self.database = Some(db.to_string());
            }
        }
        if self.username.is_none() && !url.username().is_empty() {
            self.username = Some(url.username().to_string());
        }
        if self.password.is_none() {
            if let Some(p) = url.password() {
                self.password = Some(SecretString::from(p.to_string()));
            }
        }
        Ok(())
    }

    /// `//host:port/service` or `host:port:SID`.
    fn apply_oracle_descriptor(&mut self, rest: &str) -> Result<(), DriverError> {
        let rest = rest.trim_start_matches("//");
        let invalid = || DriverError::InvalidParams(format!("invalid oracle url: {}", rest));
        let (address, service) = match rest.split_once('/') {
            Some((address, service)) => (address, service),
            None => rest.rsplit_once(':').ok_or_else(invalid)?,
        };
        let (host, port) = match address.split_once(':') {
            Some((host, port)) => (host, Some(port.parse::<u16>().map_err(|_| invalid())?)),
            None => (address, None),
        };
        if host.is_empty() || service.is_empty() {
            return Err(invalid());
        }
        if self.host.is_none() {
            self.host = Some(host.to_string());
        }
        if self.port.is_none() {
            self.port = port;
        }
        if self.database.is_none() {
            self.database = Some(service.to_string());
        }
        Ok(())
    }

    pub fn host_or_err(&self) -> Result<&str, DriverError> {
        self.host
            .as_deref()
            .ok_or_else(|| DriverError::InvalidParams("host or url is required".into()))
    }

    pub fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_common::models::DatabaseProvider;

    fn config(params: serde_json::Value) -> DatabaseConfig {
        DatabaseConfig {
            id: "cfg".into(),
            database_connection_name: "main".into(),
            provider: DatabaseProvider::PostgreSql,
            config: serde_json::from_value(params).unwrap(),
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_jdbc_url_is_parsed() {
        let target = ConnectionTarget::from_config(
            &config(json!({
                "url": "jdbc:postgresql://db.internal:5433/sales",
                "username": "app",
                "password": "s3cret",
                "maxPoolSize": 4
            })),
            &PoolSettings::default(),
        )
        .unwrap();

        assert_eq!(target.host.as_deref(), Some("db.internal"));
        assert_eq!(target.port, Some(5433));
        assert_eq!(target.database.as_deref(), Some("sales"));
        assert_eq!(target.username.as_deref(), Some("app"));
        assert_eq!(target.password_str(), Some("s3cret"));
        assert_eq!(target.max_size, 4);
    }

    #[test]
    fn test_explicit_params_win_over_url() {
        let target = ConnectionTarget::from_config(
            &config(json!({"url": "mysql://a:3306/one", "host": "b", "database": "two"})),
            &PoolSettings::default(),
        )
        .unwrap();
        assert_eq!(target.host.as_deref(), Some("b"));
        assert_eq!(target.database.as_deref(), Some("two"));
        assert_eq!(target.port, Some(3306));
    }

    #[test]
    fn test_sqlite_url() {
        let target = ConnectionTarget::from_config(
            &config(json!({"url": "jdbc:sqlite:/var/data/app.db"})),
            &PoolSettings::default(),
        )
        .unwrap();
        assert_eq!(target.path.as_deref(), Some("/var/data/app.db"));
    }

    #[test]
    fn test_sqlserver_url_properties() {
        let target = ConnectionTarget::from_config(
            &config(json!({
                "url": "jdbc:sqlserver://mssql.internal:1433;databaseName=sales;trustServerCertificate=true",
                "username": "sa",
                "password": "x"
            })),
            &PoolSettings::default(),
        )
        .unwrap();
        assert_eq!(target.host.as_deref(), Some("mssql.internal"));
        assert_eq!(target.port, Some(1433));
        assert_eq!(target.database.as_deref(), Some("sales"));
        assert!(target.trust_server_certificate);
    }

    #[test]
    fn test_oracle_thin_urls() {
        let target = ConnectionTarget::from_config(
            &config(json!({"url": "jdbc:oracle:thin:@//ora.internal:1522/ORCLPDB1"})),
            &PoolSettings::default(),
        )
        .unwrap();
        assert_eq!(target.host.as_deref(), Some("ora.internal"));
        assert_eq!(target.port, Some(1522));
        assert_eq!(target.database.as_deref(), Some("ORCLPDB1"));

        let target = ConnectionTarget::from_config(
            &config(json!({"url": "jdbc:oracle:thin:@ora.internal:1521:XE"})),
            &PoolSettings::default(),
        )
        .unwrap();
        assert_eq!(target.port, Some(1521));
        assert_eq!(target.database.as_deref(), Some("XE"));

        assert!(ConnectionTarget::from_config(
            &config(json!({"url": "jdbc:oracle:thin:@ora.internal"})),
            &PoolSettings::default(),
        )
        .is_err());
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = ConnectionTarget::from_config(
            &config(json!({"host": "a", "port": "http"})),
            &PoolSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::InvalidParams(_)));
    }
}
