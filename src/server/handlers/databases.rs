//! Database handlers

use crate::server::handler::{parse_body, ApiResult, CreateDatabaseBody};
use crate::server::handlers::path_name;
use crate::server::router::{AdminOutcome, AdministrativeRequest};
use crate::server::ServerState;
use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

impl From<CreateDatabaseBody> for AdministrativeRequest {
    fn from(body: CreateDatabaseBody) -> Self {
        AdministrativeRequest::CreateDatabase { name: body.name }
    }
}

/// `GET /databases/list`
pub async fn list(State(state): State<ServerState>) -> ApiResult<AdminOutcome> {
    state
        .dispatcher
        .execute(AdministrativeRequest::ListDatabases)
        .await
}

/// `GET /databases/{name}`
pub async fn find(
    State(state): State<ServerState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AdminOutcome> {
    let name = path_name(path)?;
    state
        .dispatcher
        .execute(AdministrativeRequest::FindDatabase { name })
        .await
}

/// `POST /databases/create`
pub async fn create(State(state): State<ServerState>, body: Bytes) -> ApiResult<AdminOutcome> {
    let body: CreateDatabaseBody = parse_body(&body)?;
    state.dispatcher.execute(body.into()).await
}

/// `DELETE /databases/delete/{name}`
pub async fn delete(
    State(state): State<ServerState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AdminOutcome> {
    let name = path_name(path)?;
    state
        .dispatcher
        .execute(AdministrativeRequest::DeleteDatabase { name })
        .await
}
