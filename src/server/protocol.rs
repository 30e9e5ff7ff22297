//! Protocol types for the HTTP API
//!
//! Every response body is an [`Envelope`]: `{"result": ..., "error": null}` on success or
//! `{"result": null, "error": "..."}` on failure. The envelope is an enum, so a value
//! with both or neither field populated cannot be built or decoded.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header naming the failed step of a multi-step operation
pub const FAILED_STEP_HEADER: &str = "x-failed-step";

/// Header marking a stub endpoint that had no effect
pub const NOT_IMPLEMENTED_HEADER: &str = "x-not-implemented";

// =============================================================================
// Envelope
// =============================================================================

/// Uniform response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub enum Envelope {
    /// Successful result payload (never JSON `null`)
    Result(Value),
    /// Error message
    Error(String),
}

impl Envelope {
    /// Create a result envelope.
    ///
    /// A payload that fails to serialize, or serializes to `null`, becomes an error
    /// envelope instead.
    pub fn result(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(Value::Null) => Envelope::Error("operation produced an empty result".to_string()),
            Ok(value) => Envelope::Result(value),
            Err(e) => Envelope::Error(format!("failed to encode result: {}", e)),
        }
    }

    /// Create an error envelope
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error(_))
    }

    /// Result payload, if any
    pub fn result_value(&self) -> Option<&Value> {
        match self {
            Envelope::Result(value) => Some(value),
            Envelope::Error(_) => None,
        }
    }

    /// Error message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Envelope::Result(_) => None,
            Envelope::Error(message) => Some(message),
        }
    }
}

/// On-the-wire shape of [`Envelope`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Result(value) => WireEnvelope {
                result: Some(value),
                error: None,
            },
            Envelope::Error(message) => WireEnvelope {
                result: None,
                error: Some(message),
            },
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = String;

    fn try_from(wire: WireEnvelope) -> Result<Self, String> {
        match (wire.result, wire.error) {
            (Some(value), None) => Ok(Envelope::Result(value)),
            (None, Some(message)) => Ok(Envelope::Error(message)),
            (Some(_), Some(_)) => Err("envelope carries both result and error".to_string()),
            (None, None) => Err("envelope carries neither result nor error".to_string()),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode one envelope as the complete HTTP response.
///
/// `marker` adds a single static header (`FAILED_STEP_HEADER` or `NOT_IMPLEMENTED_HEADER`).
pub fn encode(
    status: StatusCode,
    envelope: Envelope,
    marker: Option<(&'static str, &'static str)>,
) -> Response {
    let mut response = (status, Json(envelope)).into_response();
    if let Some((name, value)) = marker {
        response.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

// =============================================================================
// Error Codes
// =============================================================================

/// Error taxonomy of the administrative API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No database session could be acquired
    ConnectionError,
    /// Malformed or invalid request
    ValidationError,
    /// A delegated catalog operation failed (includes not-found)
    AdminOperationError,
    /// The peer role probe failed
    PeerProbeError,
    /// The restart command failed
    RestartFailedError,
    /// Unexpected server error
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::ConnectionError => "CONNECTION_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AdminOperationError => "ADMIN_OPERATION_ERROR",
            ErrorCode::PeerProbeError => "PEER_PROBE_ERROR",
            ErrorCode::RestartFailedError => "RESTART_FAILED_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Tests
// =============================================================================
