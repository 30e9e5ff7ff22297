//! HTTP route handlers
//!
//! Handlers are organized by route prefix:
//!
//! - `users` - role management (`/users/...`)
//! - `databases` - database management (`/databases/...`)
//! - `admin` - cluster actions (`/admin/...`)
//!
//! Each handler decodes and validates its input, builds one
//! [`AdministrativeRequest`](crate::server::router::AdministrativeRequest) and hands it
//! to the shared [`Dispatcher`](crate::server::router::Dispatcher).

pub mod admin;
pub mod databases;
pub mod users;

use crate::server::handler::{validate_identifier, ApiError, ApiResult};
use axum::extract::rejection::PathRejection;
use axum::extract::Path;

/// Unwrap a `{name}` path segment and check it is a usable identifier
pub(crate) fn path_name(path: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    let Path(name) = path.map_err(|e| ApiError::validation(e.body_text()))?;
    validate_identifier("name", &name)?;
    Ok(name)
}
