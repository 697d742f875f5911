//! Carries [`TesseraError`] across the RPC boundary.
//!
//! The shard puts the serialized error in the status details. The client restores it from
//! there; statuses without details are classified by their gRPC code.

use bytes::Bytes;
use tessera_error::{ErrorCode, ErrorContext, TesseraError};
use tonic::{Code, Status};

pub fn to_status(err: &TesseraError) -> Status {
    let code = match err.code {
        ErrorCode::ConfigNotFound | ErrorCode::TemplateNotFound => Code::NotFound,
        code if code.is_build_error() => Code::InvalidArgument,
        ErrorCode::ShardUnavailable | ErrorCode::ConnectionFailed | ErrorCode::PoolExhausted => {
            Code::Unavailable
        }
        _ => Code::Internal,
    };
    Status::with_details(code, err.message.clone(), Bytes::from(err.to_json()))
}

/// Restores the shard's error. `host` and `port` identify the shard for transport failures.
pub fn from_status(status: Status, host: &str, port: u16) -> TesseraError {
    if let Ok(details) = std::str::from_utf8(status.details()) {
        if let Some(err) = TesseraError::from_json(details) {
            return err;
        }
    }
    let shard = ErrorContext::Shard {
        host: host.to_string(),
        port,
    };
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown => {
            TesseraError::new(
                ErrorCode::ShardUnavailable,
                format!("Shard {}:{} unavailable: {}", host, port, status.message()),
            )
            .with_context(shard)
        }
        _ => TesseraError::new(ErrorCode::RemoteExecution, status.message().to_string())
            .with_context(shard),
    }
}
