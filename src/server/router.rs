//! Request dispatch
//!
//! The [`Dispatcher`] turns one [`AdministrativeRequest`] into the ordered collaborator
//! calls it stands for and returns a single [`AdminOutcome`] or [`ApiError`].
//!
//! Invariants enforced here:
//! - database-backed requests acquire exactly one [`ConnectionScope`] and release it
//!   exactly once, whatever the outcome
//! - multi-step requests stop at the first failing step and report that step
//! - collaborator error messages are passed through verbatim

use crate::cluster::{PeerRoleProber, ProcessRunner, RestartTrigger, RoleProbe, RoleProbeResult};
use crate::config::AdminConfig;
use crate::database::{
    AdminSession, ConnectionScope, Connector, DatabaseInfo, PgConnector, UserInfo,
};
use crate::server::handler::{ApiError, ApiResult};
use crate::server::protocol::{encode, Envelope, NOT_IMPLEMENTED_HEADER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Steps of `CreateUser`, as reported when one fails
pub const STEP_CREATE_ROLE: &str = "create_role";
pub const STEP_GRANT_ACCESS: &str = "grant_access";
pub const STEP_GRANT_SUPERUSER: &str = "grant_superuser";

// =============================================================================
// Requests and Outcomes
// =============================================================================

/// One administrative request, decoded from the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdministrativeRequest {
    CreateUser {
        username: String,
        password: String,
        /// Database to grant access to; empty for none
        database: String,
        superuser: bool,
    },
    DeleteUser {
        name: String,
    },
    FindUser {
        name: String,
    },
    ListUsers,
    CreateDatabase {
        name: String,
    },
    DeleteDatabase {
        name: String,
    },
    FindDatabase {
        name: String,
    },
    ListDatabases,
    CheckRole {
        address: IpAddr,
    },
    Restart,
    Failover,
    Settings,
}

impl AdministrativeRequest {
    /// Stable label used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AdministrativeRequest::CreateUser { .. } => "create_user",
            AdministrativeRequest::DeleteUser { .. } => "delete_user",
            AdministrativeRequest::FindUser { .. } => "find_user",
            AdministrativeRequest::ListUsers => "list_users",
            AdministrativeRequest::CreateDatabase { .. } => "create_database",
            AdministrativeRequest::DeleteDatabase { .. } => "delete_database",
            AdministrativeRequest::FindDatabase { .. } => "find_database",
            AdministrativeRequest::ListDatabases => "list_databases",
            AdministrativeRequest::CheckRole { .. } => "check_role",
            AdministrativeRequest::Restart => "restart",
            AdministrativeRequest::Failover => "failover",
            AdministrativeRequest::Settings => "settings",
        }
    }

    /// Whether the request runs against a database session
    pub fn requires_connection(&self) -> bool {
        !matches!(
            self,
            AdministrativeRequest::CheckRole { .. }
                | AdministrativeRequest::Restart
                | AdministrativeRequest::Failover
                | AdministrativeRequest::Settings
        )
    }
}

/// Successful result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum AdminOutcome {
    /// A mutation completed; callers re-query to observe the new state
    Done,
    /// Stub endpoint; nothing happened
    NotImplemented(&'static str),
    User(UserInfo),
    Users(Vec<UserInfo>),
    Database(DatabaseInfo),
    Databases(Vec<DatabaseInfo>),
    Role(RoleProbeResult),
    Message(String),
}

impl AdminOutcome {
    /// Envelope carrying this outcome as its result
    pub fn to_envelope(&self) -> Envelope {
        match self {
            AdminOutcome::Done | AdminOutcome::NotImplemented(_) => Envelope::result(true),
            AdminOutcome::User(user) => Envelope::result(user),
            AdminOutcome::Users(users) => Envelope::result(users),
            AdminOutcome::Database(db) => Envelope::result(db),
            AdminOutcome::Databases(dbs) => Envelope::result(dbs),
            AdminOutcome::Role(role) => Envelope::result(role),
            AdminOutcome::Message(message) => Envelope::result(message),
        }
    }
}

impl IntoResponse for AdminOutcome {
    fn into_response(self) -> Response {
        let marker = match self {
            AdminOutcome::NotImplemented(feature) => Some((NOT_IMPLEMENTED_HEADER, feature)),
            _ => None,
        };
        outcome_response(self.to_envelope(), marker)
    }
}

/// Encode an outcome envelope. An outcome that failed to encode is a server error,
/// never a 200.
fn outcome_response(envelope: Envelope, marker: Option<(&'static str, &'static str)>) -> Response {
    let status = if envelope.is_error() {
        tracing::error!(
            "failed to encode outcome: {}",
            envelope.error_message().unwrap_or_default()
        );
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    encode(status, envelope, marker)
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Executes administrative requests against the injected collaborators
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
    prober: Arc<dyn RoleProbe>,
    restarter: RestartTrigger,
    connect_timeout: Duration,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        connector: Arc<dyn Connector>,
        prober: Arc<dyn RoleProbe>,
        restarter: RestartTrigger,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            prober,
            restarter,
            connect_timeout,
        }
    }

    /// Create a dispatcher wired to PostgreSQL, the HTTP role prober and the process runner
    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(
            Arc::new(PgConnector::new(config.database.clone())),
            Arc::new(PeerRoleProber::new(config.probe_timeout)),
            RestartTrigger::new(Arc::new(ProcessRunner), config.restart_timeout),
            config.database.connect_timeout,
        )
    }

    /// Execute one request
    pub async fn execute(&self, request: AdministrativeRequest) -> ApiResult<AdminOutcome> {
        let span = tracing::info_span!(
            "admin_request",
            request_id = %uuid::Uuid::new_v4(),
            op = request.name()
        );

        async move {
            let result = self.execute_inner(request).await;
            match &result {
                Ok(_) => tracing::info!("request completed"),
                Err(e) => tracing::warn!(
                    code = %e.code,
                    step = e.step.unwrap_or("-"),
                    "request failed: {}",
                    e.message
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, request: AdministrativeRequest) -> ApiResult<AdminOutcome> {
        match request {
            AdministrativeRequest::CheckRole { address } => {
                let role = self.prober.probe(address).await?;
                Ok(AdminOutcome::Role(role))
            }
            AdministrativeRequest::Restart => {
                let message = self.restarter.trigger().await?;
                Ok(AdminOutcome::Message(message))
            }
            AdministrativeRequest::Failover => {
                tracing::warn!("failover is not implemented; no action taken");
                Ok(AdminOutcome::NotImplemented("failover"))
            }
            AdministrativeRequest::Settings => {
                tracing::warn!("settings is not implemented; no action taken");
                Ok(AdminOutcome::NotImplemented("settings"))
            }
            request => {
                let scope =
                    ConnectionScope::acquire(self.connector.as_ref(), self.connect_timeout).await?;
                let result = translate(&*scope, request).await;
                scope.release();
                result
            }
        }
    }
}

/// Run the catalog operations for a database-backed request, stopping at the first failure
async fn translate(
    session: &dyn AdminSession,
    request: AdministrativeRequest,
) -> ApiResult<AdminOutcome> {
    match request {
        AdministrativeRequest::CreateUser {
            username,
            password,
            database,
            superuser,
        } => {
            session
                .create_user(&username, &password)
                .await
                .map_err(|e| ApiError::from(e).at_step(STEP_CREATE_ROLE))?;

            if !database.is_empty() {
                session
                    .grant_access(&username, &database)
                    .await
                    .map_err(|e| ApiError::from(e).at_step(STEP_GRANT_ACCESS))?;
            }

            if superuser {
                session
                    .grant_superuser(&username)
                    .await
                    .map_err(|e| ApiError::from(e).at_step(STEP_GRANT_SUPERUSER))?;
            }

            Ok(AdminOutcome::Done)
        }
        AdministrativeRequest::DeleteUser { name } => {
            session.delete_user(&name).await?;
            Ok(AdminOutcome::Done)
        }
        AdministrativeRequest::FindUser { name } => {
            Ok(AdminOutcome::User(session.find_user(&name).await?))
        }
        AdministrativeRequest::ListUsers => Ok(AdminOutcome::Users(session.list_users().await?)),
        AdministrativeRequest::CreateDatabase { name } => {
            session.create_database(&name).await?;
            Ok(AdminOutcome::Done)
        }
        AdministrativeRequest::DeleteDatabase { name } => {
            session.delete_database(&name).await?;
            Ok(AdminOutcome::Done)
        }
        AdministrativeRequest::FindDatabase { name } => {
            Ok(AdminOutcome::Database(session.find_database(&name).await?))
        }
        AdministrativeRequest::ListDatabases => {
            Ok(AdminOutcome::Databases(session.list_databases().await?))
        }
        other => Err(ApiError::internal(format!(
            "{} does not run against a database session",
            other.name()
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cluster::restart::tests::FakeRunner;
    use crate::cluster::ProbeError;
    use crate::database::fake::FakeConnector;
    use crate::server::protocol::ErrorCode;
    use async_trait::async_trait;

    /// Prober answering from a fixed table
    pub(crate) struct FakeProbe {
        pub role: Option<&'static str>,
        pub status: u16,
    }

    #[async_trait]
    impl RoleProbe for FakeProbe {
        async fn probe(&self, address: IpAddr) -> Result<RoleProbeResult, ProbeError> {
            let endpoint = format!("http://[{}]:5500/flycheck/role", address);
            match self.role {
                Some(body) if self.status == 200 => Ok(RoleProbeResult::from_body(body)),
                Some(_) => Err(ProbeError::Status {
                    endpoint,
                    status: self.status,
                }),
                None => Err(ProbeError::Connect {
                    endpoint,
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    pub(crate) fn dispatcher_with(connector: FakeConnector, exit_code: i32) -> Dispatcher {
        Dispatcher::new(
            Arc::new(connector),
            Arc::new(FakeProbe {
                role: Some("\"primary\"\n"),
                status: 200,
            }),
            RestartTrigger::new(
                Arc::new(FakeRunner::exiting(exit_code)),
                Duration::from_secs(1),
            ),
            Duration::from_secs(1),
        )
    }

    fn create_user(database: &str, superuser: bool) -> AdministrativeRequest {
        AdministrativeRequest::CreateUser {
            username: "app".to_string(),
            password: "secret".to_string(),
            database: database.to_string(),
            superuser,
        }
    }

    #[tokio::test]
    async fn test_create_user_single_call() {
        let connector = FakeConnector::new();
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let outcome = dispatcher.execute(create_user("", false)).await.unwrap();
        assert_eq!(outcome, AdminOutcome::Done);
        assert_eq!(connector.calls(), vec!["create_user"]);
        assert_eq!(connector.acquired(), 1);
        assert_eq!(connector.released(), 1);
    }

    #[tokio::test]
    async fn test_create_user_all_steps_in_order() {
        let connector = FakeConnector::new().with_database("appdb");
        let dispatcher = dispatcher_with(connector.clone(), 0);

        dispatcher.execute(create_user("appdb", true)).await.unwrap();
        assert_eq!(
            connector.calls(),
            vec!["create_user", "grant_access", "grant_superuser"]
        );

        let user = connector.user("app").unwrap();
        assert!(user.superuser);
        assert_eq!(user.databases, vec!["appdb"]);
    }

    #[tokio::test]
    async fn test_create_user_grant_failure_short_circuits() {
        let connector = FakeConnector::new()
            .with_database("appdb")
            .failing(&["grant_access"]);
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let err = dispatcher
            .execute(create_user("appdb", true))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminOperationError);
        assert_eq!(err.step, Some(STEP_GRANT_ACCESS));
        assert_eq!(err.message, "grant_access rejected by server");
        assert_eq!(connector.calls(), vec!["create_user", "grant_access"]);
        assert_eq!(connector.released(), 1);
    }

    #[tokio::test]
    async fn test_create_user_role_failure_stops_everything() {
        let connector = FakeConnector::new()
            .with_database("appdb")
            .with_user("app", false);
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let err = dispatcher
            .execute(create_user("appdb", true))
            .await
            .unwrap_err();
        assert_eq!(err.step, Some(STEP_CREATE_ROLE));
        assert_eq!(err.message, "role \"app\" already exists");
        assert_eq!(connector.calls(), vec!["create_user"]);
    }

    #[tokio::test]
    async fn test_create_user_superuser_failure_reports_step() {
        let connector = FakeConnector::new().failing(&["grant_superuser"]);
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let err = dispatcher.execute(create_user("", true)).await.unwrap_err();
        assert_eq!(err.step, Some(STEP_GRANT_SUPERUSER));
        assert_eq!(connector.calls(), vec!["create_user", "grant_superuser"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let connector = FakeConnector::new();
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let err = dispatcher
            .execute(AdministrativeRequest::DeleteUser {
                name: "ghost".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminOperationError);
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = dispatcher
            .execute(AdministrativeRequest::DeleteDatabase {
                name: "ghost".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminOperationError);

        assert_eq!(connector.acquired(), 2);
        assert_eq!(connector.released(), 2);
    }

    #[tokio::test]
    async fn test_find_and_list() {
        let connector = FakeConnector::new()
            .with_user("alice", true)
            .with_user("bob", false)
            .with_database("appdb");
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let outcome = dispatcher
            .execute(AdministrativeRequest::FindUser {
                name: "alice".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, AdminOutcome::User(ref u) if u.superuser));

        let outcome = dispatcher
            .execute(AdministrativeRequest::ListUsers)
            .await
            .unwrap();
        match outcome {
            AdminOutcome::Users(users) => {
                let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
                assert_eq!(names, vec!["alice", "bob"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let err = dispatcher
            .execute(AdministrativeRequest::FindDatabase {
                name: "missing".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let outcome = dispatcher
            .execute(AdministrativeRequest::ListDatabases)
            .await
            .unwrap();
        assert!(matches!(outcome, AdminOutcome::Databases(ref dbs) if dbs.len() == 1));
        assert_eq!(connector.acquired(), connector.released());
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let connector = FakeConnector::new().failing_connect();
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let err = dispatcher
            .execute(AdministrativeRequest::ListUsers)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionError);
        assert!(connector.calls().is_empty());
        assert_eq!(connector.released(), 0);
    }

    #[tokio::test]
    async fn test_non_database_requests_skip_connection() {
        let connector = FakeConnector::new();
        let dispatcher = dispatcher_with(connector.clone(), 0);

        let outcome = dispatcher
            .execute(AdministrativeRequest::CheckRole {
                address: "fdaa::2".parse().unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AdminOutcome::Role(RoleProbeResult::from_body("primary"))
        );

        let outcome = dispatcher
            .execute(AdministrativeRequest::Restart)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AdminOutcome::Message("Restart completed successfully".to_string())
        );

        assert_eq!(
            dispatcher
                .execute(AdministrativeRequest::Failover)
                .await
                .unwrap(),
            AdminOutcome::NotImplemented("failover")
        );
        assert_eq!(
            dispatcher
                .execute(AdministrativeRequest::Settings)
                .await
                .unwrap(),
            AdminOutcome::NotImplemented("settings")
        );

        assert_eq!(connector.acquired(), 0);
    }

    #[tokio::test]
    async fn test_restart_failure() {
        let dispatcher = dispatcher_with(FakeConnector::new(), 1);
        let err = dispatcher
            .execute(AdministrativeRequest::Restart)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RestartFailedError);
        assert!(err.message.contains("exit status: 1"));
    }

    #[tokio::test]
    async fn test_probe_failure_is_peer_probe_error() {
        let dispatcher = Dispatcher::new(
            Arc::new(FakeConnector::new()),
            Arc::new(FakeProbe {
                role: Some("down"),
                status: 503,
            }),
            RestartTrigger::new(Arc::new(FakeRunner::exiting(0)), Duration::from_secs(1)),
            Duration::from_secs(1),
        );
        let err = dispatcher
            .execute(AdministrativeRequest::CheckRole {
                address: "fdaa::2".parse().unwrap(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PeerProbeError);
        assert!(err.message.contains("503"));
    }

    #[test]
    fn test_outcome_envelopes() {
        assert_eq!(
            serde_json::to_value(AdminOutcome::Done.to_envelope()).unwrap(),
            serde_json::json!({"result": true, "error": null})
        );
        assert_eq!(
            AdminOutcome::NotImplemented("settings").to_envelope(),
            Envelope::result(true)
        );
        assert_eq!(
            AdminOutcome::Role(RoleProbeResult::from_body("\"replica\"\n")).to_envelope(),
            Envelope::result("replica")
        );
    }

    #[test]
    fn test_unencodable_outcome_is_server_error() {
        let response = outcome_response(Envelope::result(()), None);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AdminOutcome::Done.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = AdminOutcome::NotImplemented("failover").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[NOT_IMPLEMENTED_HEADER], "failover");
    }

    #[test]
    fn test_requires_connection() {
        assert!(AdministrativeRequest::ListUsers.requires_connection());
        assert!(!AdministrativeRequest::Restart.requires_connection());
        assert!(!AdministrativeRequest::CheckRole {
            address: "::1".parse().unwrap()
        }
        .requires_connection());
    }
}
