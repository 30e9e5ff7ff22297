//! Error type, request bodies and validation shared by all HTTP handlers
//!
//! Collaborator errors (`ConnectionError`, `AdminError`, `ProbeError`, `RestartError`)
//! are converted into [`ApiError`] here, which carries the taxonomy code, the HTTP
//! status and, for multi-step operations, the step that failed.

use crate::cluster::{ProbeError, RestartError};
use crate::database::{AdminError, ConnectionError};
use crate::server::protocol::{encode, Envelope, ErrorCode, FAILED_STEP_HEADER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Longest identifier PostgreSQL keeps without truncation (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

// =============================================================================
// Error
// =============================================================================

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Error type for API operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Error code
    pub code: ErrorCode,
    /// HTTP status to respond with
    pub status: StatusCode,
    /// Error message, reported verbatim in the envelope
    pub message: String,
    /// Failing step of a multi-step operation
    pub step: Option<&'static str>,
}

impl ApiError {
    /// Create a new error
    pub fn new(code: ErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            step: None,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, StatusCode::BAD_REQUEST, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalError,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    /// Record which step of a multi-step operation failed
    pub fn at_step(mut self, step: &'static str) -> Self {
        self.step = Some(step);
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step {
            Some(step) => write!(f, "{} at {}: {}", self.code, step, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let marker = self.step.map(|step| (FAILED_STEP_HEADER, step));
        encode(self.status, Envelope::error(self.message), marker)
    }
}

impl From<ConnectionError> for ApiError {
    fn from(err: ConnectionError) -> Self {
        Self::new(
            ErrorCode::ConnectionError,
            StatusCode::SERVICE_UNAVAILABLE,
            err.to_string(),
        )
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(ErrorCode::AdminOperationError, status, err.to_string())
    }
}

impl From<ProbeError> for ApiError {
    fn from(err: ProbeError) -> Self {
        Self::new(ErrorCode::PeerProbeError, StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<RestartError> for ApiError {
    fn from(err: RestartError) -> Self {
        Self::new(
            ErrorCode::RestartFailedError,
            StatusCode::INTERNAL_SERVER_ERROR,
            err.to_string(),
        )
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("invalid request body: {}", err))
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Checks performed on a request body after JSON decoding
pub trait Validate {
    fn validate(&self) -> ApiResult<()>;
}

/// Check that `value` is usable as a role or database name
pub fn validate_identifier(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", field)));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ApiError::validation(format!(
            "{} must be at most {} bytes",
            field, MAX_IDENTIFIER_LENGTH
        )));
    }
    if value.contains('\0') {
        return Err(ApiError::validation(format!(
            "{} must not contain NUL bytes",
            field
        )));
    }
    Ok(())
}

/// Decode and validate a JSON request body
pub fn parse_body<T: DeserializeOwned + Validate>(body: &[u8]) -> ApiResult<T> {
    let parsed: T = serde_json::from_slice(body)?;
    parsed.validate()?;
    Ok(parsed)
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Body of `POST /users/create`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateUserBody {
    pub username: String,
    pub password: String,
    /// Database to grant access to; empty for none
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub superuser: bool,
}

impl Validate for CreateUserBody {
    fn validate(&self) -> ApiResult<()> {
        validate_identifier("username", &self.username)?;
        if self.password.is_empty() {
            return Err(ApiError::validation("password must not be empty"));
        }
        if self.password.contains('\0') {
            return Err(ApiError::validation("password must not contain NUL bytes"));
        }
        if !self.database.is_empty() {
            validate_identifier("database", &self.database)?;
        }
        Ok(())
    }
}

/// Body of `POST /databases/create`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateDatabaseBody {
    pub name: String,
}

impl Validate for CreateDatabaseBody {
    fn validate(&self) -> ApiResult<()> {
        validate_identifier("name", &self.name)
    }
}

/// Body of `POST /admin/role`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckRoleBody {
    pub address: IpAddr,
}

impl Validate for CheckRoleBody {
    fn validate(&self) -> ApiResult<()> {
        if self.address.is_unspecified() {
            return Err(ApiError::validation(format!(
                "address {} is not a peer address",
                self.address
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
