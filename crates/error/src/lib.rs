//! # tessera-error
//!
//! Unified error types for the Tessera SQL execution engine.
//!
//! Every error carries:
//! - A numeric error code (TESSERA-XXXX)
//! - Structured JSON context
//! - An optional hint for the template author

mod code;
mod context;
mod convert;

pub use code::{ErrorCategory, ErrorCode};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all Tessera operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseraError {
    /// Numeric error code (e.g., "TESSERA-2001")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Suggestion for fixing the template or request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Correlation ID carried across the gateway and shard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl TesseraError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
            trace_id: None,
        }
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// See [`ErrorCode::is_build_error`].
    pub fn is_build_error(&self) -> bool {
        self.code.is_build_error()
    }

    /// See [`ErrorCode::is_transport`].
    pub fn is_transport(&self) -> bool {
        self.code.is_transport()
    }

    /// Serialize to JSON for RPC status details and result payloads
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize TesseraError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }

    /// Parse an error previously produced by [`TesseraError::to_json`].
    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

impl fmt::Display for TesseraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for TesseraError {}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;
