//! Caller-facing entry point: resolves templates and configs, routes to a shard and turns
//! every outcome into a [`QueryPayload`].

use crate::messages::{RunQueryRequest, TableSchemaRequest};
use crate::router::ShardRouter;
use crate::service::ShardClient;
use crate::status::from_status;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tessera_common::models::{DatabaseConfig, QueryCondition};
use tessera_common::store::ConfigStore;
use tessera_error::{ErrorCode, Result, TesseraError};
use tessera_runtime::TemplateCache;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The shard could not be reached.
    Transport,
    /// The shard ran the request and the database rejected it.
    Statement,
    /// The request itself is invalid: unknown ids, bad template, missing arguments.
    Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadError {
    pub kind: FailureKind,
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl From<&TesseraError> for PayloadError {
    fn from(err: &TesseraError) -> Self {
        let kind = if err.is_transport() {
            FailureKind::Transport
        } else if err.is_build_error()
            || matches!(
                err.code,
                ErrorCode::ConfigNotFound | ErrorCode::TemplateNotFound
            )
        {
            FailureKind::Request
        } else {
            FailureKind::Statement
        };
        Self {
            kind,
            code: err.code,
            message: err.to_string(),
            retryable: kind == FailureKind::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PayloadError>,
}

impl QueryPayload {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(err: &TesseraError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(PayloadError::from(err)),
        }
    }

    fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}

pub struct Gateway {
    templates: Arc<TemplateCache>,
    configs: Arc<dyn ConfigStore>,
    router: Arc<ShardRouter>,
}

impl Gateway {
    pub fn new(
        templates: Arc<TemplateCache>,
        configs: Arc<dyn ConfigStore>,
        router: Arc<ShardRouter>,
    ) -> Self {
        Self {
            templates,
            configs,
            router,
        }
    }

    /// Runs template `template_id` on connection `config_id`. Non-empty `overrides` replace
    /// the template's conditions for this call only.
    pub async fn run_query(
        &self,
        template_id: &str,
        config_id: &str,
        overrides: Vec<QueryCondition>,
    ) -> QueryPayload {
        let started = Instant::now();
        let result = self.try_run_query(template_id, config_id, overrides).await;
        match &result {
            Ok(_) => info!(
                target: "queries",
                template_id,
                config_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Gateway query completed"
            ),
            Err(e) => error!(
                target: "errors",
                template_id,
                config_id,
                code = %e.code,
                error = %e,
                "Gateway query failed"
            ),
        }
        QueryPayload::from_result(result)
    }

    /// Catalog columns of a table, named directly or through a template's target table.
    pub async fn get_table_schema(
        &self,
        config_id: &str,
        table_name: Option<&str>,
        template_id: Option<&str>,
    ) -> QueryPayload {
        let result = self
            .try_get_table_schema(config_id, table_name, template_id)
            .await;
        if let Err(e) = &result {
            error!(target: "errors", config_id, code = %e.code, error = %e, "Table schema lookup failed");
        }
        QueryPayload::from_result(result)
    }

    async fn try_run_query(
        &self,
        template_id: &str,
        config_id: &str,
        overrides: Vec<QueryCondition>,
    ) -> Result<Value> {
        let (template, config) = tokio::try_join!(
            self.templates.get_by_id(template_id),
            self.find_config(config_id)
        )?;

        let (port, channel) = self.router.channel_for(&config.id)?;
        let request = RunQueryRequest {
            template: (*template).clone(),
            config,
            override_conditions: overrides,
        };
        let response = ShardClient::new(channel)
            .run_query(request)
            .await
            .map_err(|status| from_status(status, self.router.host(), port))?;
        Ok(serde_json::from_str(&response.json_result)?)
    }

    async fn try_get_table_schema(
        &self,
        config_id: &str,
        table_name: Option<&str>,
        template_id: Option<&str>,
    ) -> Result<Value> {
        if table_name.is_none() && template_id.is_none() {
            return Err(missing_table());
        }
        let config = self.find_config(config_id).await?;
        let table = match (template_id, table_name) {
            (Some(id), _) => self.templates.get_by_id(id).await?.table_name.clone(),
            (None, Some(table)) => table.to_string(),
            (None, None) => return Err(missing_table()),
        };

        let (port, channel) = self.router.channel_for(&config.id)?;
        let response = ShardClient::new(channel)
            .get_table_schema(TableSchemaRequest {
                config_id: config.id.clone(),
                table_name: table.clone(),
            })
            .await
            .map_err(|status| from_status(status, self.router.host(), port))?;

        let columns: Vec<Value> = response
            .columns
            .into_iter()
            .map(|column| {
                json!({
                    "name": column.name,
                    "type": column.data_type,
                    "size": column.size,
                    "nullable": column.nullable,
                    "remarks": column.remarks,
                })
            })
            .collect();
        Ok(json!({ "table": table, "columns": columns }))
    }

    async fn find_config(&self, config_id: &str) -> Result<DatabaseConfig> {
        self.configs
            .find_by_id(config_id)
            .await?
            .ok_or_else(|| TesseraError::config_not_found(config_id))
    }
}

fn missing_table() -> TesseraError {
    TesseraError::new(
        ErrorCode::BadRequest,
        "Either 'templateId' or 'tableName' must be provided",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_classification() {
        let transport = PayloadError::from(&TesseraError::new(ErrorCode::ShardUnavailable, "down"));
        assert_eq!(transport.kind, FailureKind::Transport);
        assert!(transport.retryable);

        let request = PayloadError::from(&TesseraError::template_not_found("t-1"));
        assert_eq!(request.kind, FailureKind::Request);
        assert!(!request.retryable);

        let statement = PayloadError::from(&TesseraError::new(ErrorCode::StatementFailed, "dup key"));
        assert_eq!(statement.kind, FailureKind::Statement);
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = QueryPayload::failed(&TesseraError::new(ErrorCode::BadRequest, "missing"));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"]["kind"], json!("request"));
        assert_eq!(value["error"]["code"], json!("TESSERA-2006"));
        assert!(value.get("data").is_none());
    }
}
