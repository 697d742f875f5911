//! Content hashes used to detect stale cache entries.

use crate::models::{DatabaseConfig, QueryTemplate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tessera_error::Result;

/// SHA-256 hex digest over the JSON encoding of `value`.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(digest_hex(&bytes))
}

pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash over the connection parameter map only. Display name, timestamps and the
/// active flag do not invalidate a pool.
pub fn config_hash(config: &DatabaseConfig) -> Result<String> {
    content_hash(&config.config)
}

pub fn template_hash(template: &QueryTemplate) -> Result<String> {
    content_hash(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionParams, DatabaseProvider, StatementKind};

    fn config(params: &[(&str, &str)]) -> DatabaseConfig {
        let mut map = ConnectionParams::new();
        for (k, v) in params {
            map.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        DatabaseConfig {
            id: "cfg".into(),
            database_connection_name: "main".into(),
            provider: DatabaseProvider::PostgreSql,
            config: map,
            active: true,
            fallback_config_id: None,
            privacy_fallback_config: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_config_hash_ignores_insertion_order() {
        let a = config(&[("url", "postgresql://a/db"), ("username", "u")]);
        let b = config(&[("username", "u"), ("url", "postgresql://a/db")]);
        assert_eq!(config_hash(&a).unwrap(), config_hash(&b).unwrap());
    }

    #[test]
    fn test_config_hash_changes_with_params() {
        let a = config(&[("url", "postgresql://a/db")]);
        let mut b = a.clone();
        b.database_connection_name = "renamed".into();
        assert_eq!(config_hash(&a).unwrap(), config_hash(&b).unwrap());

        let c = config(&[("url", "postgresql://b/db")]);
        assert_ne!(config_hash(&a).unwrap(), config_hash(&c).unwrap());
    }

    #[test]
    fn test_template_hash_is_hex_sha256() {
        let t = QueryTemplate::new(StatementKind::Select, "orders");
        let hash = template_hash(&t).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
