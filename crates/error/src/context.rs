//! # Error Contexts
//!
//! Structured metadata attached to errors so callers can react without parsing messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for TESSERA-2002 (InvalidColumn)
    InvalidColumn {
        column: String,
        table: String,
        clause: String,
        available_columns: Vec<String>,
    },

    /// Context for TESSERA-2003 (CastError)
    Cast { value: String, sql_type: String },

    /// Context for TESSERA-2001/2004 (template errors)
    Template {
        template_id: Option<String>,
        field: Option<String>,
    },

    /// Context for connection errors (TESSERA-1001 through 1005)
    Connection {
        config_id: String,
        provider: Option<String>,
        host: Option<String>,
    },

    /// Context for TESSERA-1006 (ShardUnavailable) and 4003 (RemoteExecution)
    Shard { host: String, port: u16 },

    /// Context for TESSERA-4001/4002 (statement and catalog failures)
    Statement {
        table: Option<String>,
        sql: Option<String>,
    },

    /// Context for TESSERA-3xxx (config errors)
    Config {
        file_path: Option<String>,
        field: Option<String>,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_column_context_serde_roundtrip() {
        let ctx = ErrorContext::InvalidColumn {
            column: "stauts".to_string(),
            table: "orders".to_string(),
            clause: "SET".to_string(),
            available_columns: vec!["id".to_string(), "status".to_string()],
        };

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"type\":\"invalid_column\""));

        let de: ErrorContext = serde_json::from_str(&json).unwrap();
        match de {
            ErrorContext::InvalidColumn {
                column, clause, ..
            } => {
                assert_eq!(column, "stauts");
                assert_eq!(clause, "SET");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
