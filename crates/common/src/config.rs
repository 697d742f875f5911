use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

// Default constants
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9090";
pub const DEFAULT_ROUTER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SHARD_PORT: u16 = 9090;
pub const DEFAULT_VIRTUAL_NODES: u32 = 100;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_METADATA_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_METADATA_CAPACITY: u64 = 1_000;
pub const DEFAULT_POOL_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_POOL_CAPACITY: u64 = 300;
pub const DEFAULT_TEMPLATE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_TEMPLATE_CAPACITY: u64 = 500;

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_BATCH_PARALLELISM: usize = 4;
pub const DEFAULT_PRELOAD_LIMIT: usize = 200;
pub const DEFAULT_IN_LIST_LIMIT: usize = 1_000;

pub const DEFAULT_POOL_MAX_SIZE: usize = 10;
pub const DEFAULT_POOL_MIN_IDLE: usize = 1;
pub const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_POOL_ACQUIRE_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub router: RouterSettings,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
    #[serde(default)]
    #[validate(nested)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub stores: StoreSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    #[validate(custom(function = "validate_socket_addr"))]
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct RouterSettings {
    #[serde(default = "default_router_host")]
    #[validate(length(min = 1), custom(function = "validate_host"))]
    pub host: String,

    /// Shard ports. Accepts a YAML list or a comma-separated string.
    #[serde(default = "default_ports", deserialize_with = "deserialize_ports")]
    #[validate(length(min = 1))]
    pub ports: Vec<u16>,

    #[serde(default = "default_virtual_nodes")]
    #[validate(range(min = 1, max = 10_000))]
    pub virtual_nodes: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            host: default_router_host(),
            ports: default_ports(),
            virtual_nodes: default_virtual_nodes(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RouterSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_metadata_ttl")]
    pub metadata_ttl_secs: u64,
    #[serde(default = "default_metadata_capacity")]
    #[validate(range(min = 1))]
    pub metadata_capacity: u64,
    #[serde(default = "default_pool_ttl")]
    pub pool_ttl_secs: u64,
    #[serde(default = "default_pool_capacity")]
    #[validate(range(min = 1))]
    pub pool_capacity: u64,
    #[serde(default = "default_template_ttl")]
    pub template_ttl_secs: u64,
    #[serde(default = "default_template_capacity")]
    #[validate(range(min = 1))]
    pub template_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: default_metadata_ttl(),
            metadata_capacity: default_metadata_capacity(),
            pool_ttl_secs: default_pool_ttl(),
            pool_capacity: default_pool_capacity(),
            template_ttl_secs: default_template_ttl(),
            template_capacity: default_template_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ExecutionSettings {
    /// Ids per UPDATE batch in join emulation.
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
    /// Concurrent UPDATE batches in join emulation.
    #[serde(default = "default_batch_parallelism")]
    #[validate(range(min = 1))]
    pub batch_parallelism: usize,
    #[serde(default = "default_preload_limit")]
    pub preload_limit: usize,
    #[serde(default = "default_in_list_limit")]
    #[validate(range(min = 1))]
    pub in_list_limit: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_parallelism: default_batch_parallelism(),
            preload_limit: default_preload_limit(),
            in_list_limit: default_in_list_limit(),
        }
    }
}

/// Pool sizing used when a connection config does not carry its own.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct PoolSettings {
    #[serde(default = "default_pool_max_size")]
    #[validate(range(min = 1))]
    pub max_size: usize,
    #[serde(default = "default_pool_min_idle")]
    pub min_idle: usize,
    #[serde(default = "default_pool_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_pool_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_max_size(),
            min_idle: default_pool_min_idle(),
            idle_timeout_secs: default_pool_idle_timeout(),
            acquire_timeout_ms: default_pool_acquire_timeout(),
        }
    }
}

/// YAML seed files for the in-process template and config stores.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub templates_path: Option<String>,
    #[serde(default)]
    pub configs_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub directory: String,
    /// Writes JSON lines for the `queries` and `errors` targets.
    #[serde(default)]
    pub json_files: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
            json_files: false,
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}
fn default_router_host() -> String {
    DEFAULT_ROUTER_HOST.to_string()
}
fn default_ports() -> Vec<u16> {
    vec![DEFAULT_SHARD_PORT]
}
fn default_virtual_nodes() -> u32 {
    DEFAULT_VIRTUAL_NODES
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_metadata_ttl() -> u64 {
    DEFAULT_METADATA_TTL_SECS
}
fn default_metadata_capacity() -> u64 {
    DEFAULT_METADATA_CAPACITY
}
fn default_pool_ttl() -> u64 {
    DEFAULT_POOL_TTL_SECS
}
fn default_pool_capacity() -> u64 {
    DEFAULT_POOL_CAPACITY
}
fn default_template_ttl() -> u64 {
    DEFAULT_TEMPLATE_TTL_SECS
}
fn default_template_capacity() -> u64 {
    DEFAULT_TEMPLATE_CAPACITY
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_batch_parallelism() -> usize {
    DEFAULT_BATCH_PARALLELISM
}
fn default_preload_limit() -> usize {
    DEFAULT_PRELOAD_LIMIT
}
fn default_in_list_limit() -> usize {
    DEFAULT_IN_LIST_LIMIT
}
fn default_pool_max_size() -> usize {
    DEFAULT_POOL_MAX_SIZE
}
fn default_pool_min_idle() -> usize {
    DEFAULT_POOL_MIN_IDLE
}
fn default_pool_idle_timeout() -> u64 {
    DEFAULT_POOL_IDLE_TIMEOUT_SECS
}
fn default_pool_acquire_timeout() -> u64 {
    DEFAULT_POOL_ACQUIRE_TIMEOUT_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortsRepr {
    Single(u16),
    List(Vec<u16>),
    Csv(String),
}

fn deserialize_ports<'de, D>(deserializer: D) -> std::result::Result<Vec<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match PortsRepr::deserialize(deserializer)? {
        PortsRepr::Single(port) => Ok(vec![port]),
        PortsRepr::List(ports) => Ok(ports),
        PortsRepr::Csv(csv) => parse_port_list(&csv).map_err(serde::de::Error::custom),
    }
}

/// Parses `"9090, 9091,9092"` into ports. Empty segments are skipped.
pub fn parse_port_list(csv: &str) -> std::result::Result<Vec<u16>, String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .map_err(|e| format!("invalid shard port '{}': {}", s, e))
        })
        .collect()
}

fn validate_socket_addr(addr: &str) -> std::result::Result<(), validator::ValidationError> {
    addr.parse::<std::net::SocketAddr>()
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("invalid_socket_addr"))
}

fn validate_host(host: &str) -> std::result::Result<(), validator::ValidationError> {
    match url::Url::parse(&format!("http://{}", host)) {
        Ok(u) if u.host_str().is_some() => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_host")),
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // TESSERA_ROUTER__HOST maps to router.host, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("TESSERA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_app_config_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.execution.batch_size, 500);
        assert_eq!(config.execution.batch_parallelism, 4);
        assert_eq!(config.router.virtual_nodes, 100);
    }

    #[test]
    fn test_port_list_parsing() {
        assert_eq!(parse_port_list("9090, 9091,9092").unwrap(), vec![9090, 9091, 9092]);
        assert_eq!(parse_port_list("9090,,").unwrap(), vec![9090]);
        assert!(parse_port_list("9090,http").is_err());
    }

    #[test]
    fn test_router_rejects_empty_ports() {
        let router = RouterSettings {
            ports: vec![],
            ..Default::default()
        };
        assert!(router.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_file_with_csv_ports() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "router:\n  host: shard.internal\n  ports: \"7001,7002\"\nexecution:\n  batch_size: 50"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.router.host, "shard.internal");
        assert_eq!(config.router.ports, vec![7001, 7002]);
        assert_eq!(config.execution.batch_size, 50);
        assert_eq!(config.execution.batch_parallelism, 4);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("TESSERA_EXECUTION__PRELOAD_LIMIT", "17");
        let config = AppConfig::from_file("does-not-exist.yaml").unwrap();
        std::env::remove_var("TESSERA_EXECUTION__PRELOAD_LIMIT");
        assert_eq!(config.execution.preload_limit, 17);
    }
}
