//! Centralized error types for the bridge core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes for the ambient health surface
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::ari::AriError;
use crate::audiosocket::AudioSocketError;
use crate::realtime::RealtimeError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for AriError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "ari_http_request_failed",
            Self::HttpStatus(_, _) => "ari_http_error_status",
            Self::Timeout => "ari_timeout",
            Self::Parse(_) => "ari_parse_error",
            Self::WebSocket(_) => "ari_websocket_failed",
        }
    }
}

impl ErrorCode for AudioSocketError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "audiosocket_io_error",
            Self::IdentifyTimeout => "audiosocket_identify_timeout",
            Self::IdentifyMismatch => "audiosocket_identify_mismatch",
            Self::Malformed(_) => "audiosocket_malformed_frame",
        }
    }
}

impl ErrorCode for RealtimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "realtime_connect_failed",
            Self::WebSocket(_) => "realtime_websocket_failed",
            Self::Timeout => "realtime_receive_timeout",
            Self::Malformed(_) => "realtime_malformed_event",
            Self::Remote(_) => "realtime_remote_error",
        }
    }
}

/// Application-wide error type for the telephony bridge.
///
/// Mirrors the taxonomy in the design's error handling section:
/// protocol errors recover locally; transport, timeout, contract-violation,
/// config, and persistence errors propagate to the orchestrator or the
/// process entrypoint.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// Malformed AudioSocket frame, malformed Realtime event, or unexpected
    /// ARI response shape. Recovered locally by the caller; surfaced here
    /// only when it escapes that recovery.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// TCP or WebSocket connection closed unexpectedly. Fatal to the call.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An ARI request, Realtime receive, or AudioSocket identify exceeded
    /// its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The AudioSocket IDENTIFY payload did not match the expected call UUID.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Required configuration is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The persistence collaborator returned an error. Logged, never fatal.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No call exists for the given identifier.
    #[error("Call not found: {0}")]
    CallNotFound(String),

    /// Internal error that does not fit another category.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol_error",
            Self::Transport(_) => "transport_error",
            Self::Timeout(_) => "timeout_error",
            Self::ContractViolation(_) => "contract_violation",
            Self::Configuration(_) => "configuration_error",
            Self::Persistence(_) => "persistence_error",
            Self::CallNotFound(_) => "call_not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code for the ambient
    /// health/diagnostic surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CallNotFound(_) => StatusCode::NOT_FOUND,
            Self::ContractViolation(_) | Self::Protocol(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AriError> for BridgeError {
    fn from(err: AriError) -> Self {
        match err {
            AriError::Timeout => Self::Timeout(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<AudioSocketError> for BridgeError {
    fn from(err: AudioSocketError) -> Self {
        match err {
            AudioSocketError::IdentifyMismatch => Self::ContractViolation(err.to_string()),
            AudioSocketError::IdentifyTimeout => Self::Timeout(err.to_string()),
            AudioSocketError::Malformed(_) => Self::Protocol(err.to_string()),
            AudioSocketError::Io(_) => Self::Transport(err.to_string()),
        }
    }
}

impl From<RealtimeError> for BridgeError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::Timeout => Self::Timeout(err.to_string()),
            RealtimeError::Malformed(_) => Self::Protocol(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_returns_bad_request() {
        let err = BridgeError::ContractViolation("uuid mismatch".into());
        assert_eq!(err.code(), "contract_violation");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn call_not_found_returns_404() {
        let err = BridgeError::CallNotFound("f47ac10b".into());
        assert_eq!(err.code(), "call_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn configuration_error_returns_503() {
        let err = BridgeError::Configuration("missing OPENAI_API_KEY".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
