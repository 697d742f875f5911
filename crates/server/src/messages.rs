//! Request and response messages of the `tessera.Shard` service.

use serde::{Deserialize, Serialize};
use tessera_common::models::{ColumnInfo, DatabaseConfig, QueryCondition, QueryTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub template: QueryTemplate,
    pub config: DatabaseConfig,
    #[serde(default)]
    pub override_conditions: Vec<QueryCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    /// Statement result rendered as JSON text.
    pub json_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchemaRequest {
    pub config_id: String,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchemaResponse {
    pub columns: Vec<ColumnInfo>,
}
