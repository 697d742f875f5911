use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following TESSERA-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Connection and transport errors
/// - **2000-2999**: Template and statement-build errors
/// - **3000-3999**: Configuration errors
/// - **4000-4999**: Execution errors
/// - **5000-5999**: Internal/System errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Connection Errors (1000-1999) ===
    /// TESSERA-1001: Connection config not found in the config store
    ConfigNotFound = 1001,
    /// TESSERA-1002: Database connection could not be established
    ConnectionFailed = 1002,
    /// TESSERA-1003: Connection pool could not be built
    PoolBuildFailed = 1003,
    /// TESSERA-1004: Connection pool exhausted or checkout timed out
    PoolExhausted = 1004,
    /// TESSERA-1005: No driver available for the provider
    UnsupportedProvider = 1005,
    /// TESSERA-1006: Execution shard unreachable
    ShardUnavailable = 1006,

    // === Template Errors (2000-2999) ===
    /// TESSERA-2001: Malformed template
    TemplateError = 2001,
    /// TESSERA-2002: Column not present in table metadata
    InvalidColumn = 2002,
    /// TESSERA-2003: Value cannot be coerced to the target SQL type
    CastError = 2003,
    /// TESSERA-2004: Template not found in the template store
    TemplateNotFound = 2004,
    /// TESSERA-2005: Operation not supported for this provider or template
    UnsupportedOperation = 2005,
    /// TESSERA-2006: Request is missing required arguments
    BadRequest = 2006,

    // === Configuration Errors (3000-3999) ===
    /// TESSERA-3001: Invalid YAML syntax
    InvalidYaml = 3001,
    /// TESSERA-3002: Configuration validation failed
    SchemaViolation = 3002,
    /// TESSERA-3003: Missing required field in config
    MissingRequiredField = 3003,
    /// TESSERA-3004: Invalid connection string
    InvalidConnectionString = 3004,
    /// TESSERA-3005: Entity with the same name already exists
    DuplicateEntity = 3005,

    // === Execution Errors (4000-4999) ===
    /// TESSERA-4001: Statement failed on the database
    StatementFailed = 4001,
    /// TESSERA-4002: Catalog introspection failed
    MetadataLoad = 4002,
    /// TESSERA-4003: Shard-side failure surfaced to the gateway
    RemoteExecution = 4003,

    // === Internal Errors (5000-5999) ===
    /// TESSERA-5001: Blocking worker failed or was cancelled
    WorkerFailed = 5001,
    /// TESSERA-5002: Serialization/deserialization failed
    SerializationFailed = 5002,
    /// TESSERA-5003: Unexpected internal state
    InternalPanic = 5003,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "TESSERA-2002")
    pub fn as_str(&self) -> String {
        format!("TESSERA-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Connection,
            2000..=2999 => ErrorCategory::Template,
            3000..=3999 => ErrorCategory::Config,
            4000..=4999 => ErrorCategory::Execution,
            _ => ErrorCategory::Internal,
        }
    }

    /// Errors raised while assembling a statement. They describe a bad request and
    /// are never retried.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::TemplateError
                | Self::InvalidColumn
                | Self::CastError
                | Self::BadRequest
                | Self::UnsupportedOperation
        )
    }

    /// Errors raised before the request reached a database.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ShardUnavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("TESSERA-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::ConfigNotFound),
            1002 => Ok(Self::ConnectionFailed),
            1003 => Ok(Self::PoolBuildFailed),
            1004 => Ok(Self::PoolExhausted),
            1005 => Ok(Self::UnsupportedProvider),
            1006 => Ok(Self::ShardUnavailable),
            2001 => Ok(Self::TemplateError),
            2002 => Ok(Self::InvalidColumn),
            2003 => Ok(Self::CastError),
            2004 => Ok(Self::TemplateNotFound),
            2005 => Ok(Self::UnsupportedOperation),
            2006 => Ok(Self::BadRequest),
            3001 => Ok(Self::InvalidYaml),
            3002 => Ok(Self::SchemaViolation),
            3003 => Ok(Self::MissingRequiredField),
            3004 => Ok(Self::InvalidConnectionString),
            3005 => Ok(Self::DuplicateEntity),
            4001 => Ok(Self::StatementFailed),
            4002 => Ok(Self::MetadataLoad),
            4003 => Ok(Self::RemoteExecution),
            5001 => Ok(Self::WorkerFailed),
            5002 => Ok(Self::SerializationFailed),
            5003 => Ok(Self::InternalPanic),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Connection,
    Template,
    Config,
    Execution,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "TESSERA-1001");
        assert_eq!(ErrorCode::TemplateError.as_str(), "TESSERA-2001");
        assert_eq!(ErrorCode::UnsupportedProvider.as_str(), "TESSERA-1005");
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::try_from("TESSERA-2003".to_string()).unwrap(),
            ErrorCode::CastError
        );
        assert_eq!(
            ErrorCode::try_from("TESSERA-5003".to_string()).unwrap(),
            ErrorCode::InternalPanic
        );
        assert!(ErrorCode::try_from("TESSERA-9999".to_string()).is_err());
    }

    #[test]
    fn test_error_code_parsing_errors() {
        assert!(ErrorCode::try_from("INVALID".to_string()).is_err());
        assert!(ErrorCode::try_from("TESSERA-0000".to_string()).is_err());
        assert!(ErrorCode::try_from("TESSERA-ABC".to_string()).is_err());
        assert!(ErrorCode::try_from("STRAKE-1001".to_string()).is_err());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::ShardUnavailable.category(),
            ErrorCategory::Connection
        );
        assert_eq!(ErrorCode::CastError.category(), ErrorCategory::Template);
        assert_eq!(ErrorCode::InvalidYaml.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::MetadataLoad.category(), ErrorCategory::Execution);
        assert_eq!(ErrorCode::InternalPanic.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_build_errors_are_not_transport() {
        for code in [
            ErrorCode::TemplateError,
            ErrorCode::InvalidColumn,
            ErrorCode::CastError,
        ] {
            assert!(code.is_build_error());
            assert!(!code.is_transport());
        }
        assert!(!ErrorCode::StatementFailed.is_build_error());
        assert!(ErrorCode::ShardUnavailable.is_transport());
    }
}
