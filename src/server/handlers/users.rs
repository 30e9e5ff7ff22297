//! User handlers

use crate::server::handler::{parse_body, ApiResult, CreateUserBody};
use crate::server::handlers::path_name;
use crate::server::router::{AdminOutcome, AdministrativeRequest};
use crate::server::ServerState;
use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

impl From<CreateUserBody> for AdministrativeRequest {
    fn from(body: CreateUserBody) -> Self {
        AdministrativeRequest::CreateUser {
            username: body.username,
            password: body.password,
            database: body.database,
            superuser: body.superuser,
        }
    }
}

/// `GET /users/list`
pub async fn list(State(state): State<ServerState>) -> ApiResult<AdminOutcome> {
    state
        .dispatcher
        .execute(AdministrativeRequest::ListUsers)
        .await
}

/// `GET /users/{name}`
pub async fn find(
    State(state): State<ServerState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AdminOutcome> {
    let name = path_name(path)?;
    state
        .dispatcher
        .execute(AdministrativeRequest::FindUser { name })
        .await
}

/// `POST /users/create`
pub async fn create(State(state): State<ServerState>, body: Bytes) -> ApiResult<AdminOutcome> {
    let body: CreateUserBody = parse_body(&body)?;
    state.dispatcher.execute(body.into()).await
}

/// `DELETE /users/delete/{name}`
pub async fn delete(
    State(state): State<ServerState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AdminOutcome> {
    let name = path_name(path)?;
    state
        .dispatcher
        .execute(AdministrativeRequest::DeleteUser { name })
        .await
}
