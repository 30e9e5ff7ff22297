//! Cluster action handlers
//!
//! `failover` and `settings` are stubs: they answer `true` with the
//! `x-not-implemented` header and do nothing.

use crate::server::handler::{parse_body, ApiResult, CheckRoleBody};
use crate::server::router::{AdminOutcome, AdministrativeRequest};
use crate::server::ServerState;
use axum::body::Bytes;
use axum::extract::State;

impl From<CheckRoleBody> for AdministrativeRequest {
    fn from(body: CheckRoleBody) -> Self {
        AdministrativeRequest::CheckRole {
            address: body.address,
        }
    }
}

/// `GET /admin/restart`
pub async fn restart(State(state): State<ServerState>) -> ApiResult<AdminOutcome> {
    state.dispatcher.execute(AdministrativeRequest::Restart).await
}

/// `POST /admin/role`
pub async fn role(State(state): State<ServerState>, body: Bytes) -> ApiResult<AdminOutcome> {
    let body: CheckRoleBody = parse_body(&body)?;
    state.dispatcher.execute(body.into()).await
}

/// `GET /admin/failover`
pub async fn failover(State(state): State<ServerState>) -> ApiResult<AdminOutcome> {
    state.dispatcher.execute(AdministrativeRequest::Failover).await
}

/// `GET /admin/settings`
pub async fn settings(State(state): State<ServerState>) -> ApiResult<AdminOutcome> {
    state.dispatcher.execute(AdministrativeRequest::Settings).await
}
