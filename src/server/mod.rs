//! HTTP server module for clusteradm
//!
//! This module exposes the administrative API over HTTP. Every endpoint answers with
//! a JSON [`Envelope`](protocol::Envelope).
//!
//! # Architecture
//!
//! The server is organized into several submodules:
//!
//! - `protocol` - Response envelope, error codes and the response encoder
//! - `handler` - Error type, request bodies and validation
//! - `router` - Request translation and dispatch to the collaborators
//! - `handlers` - Individual route handler implementations
//!
//! # Request lifecycle
//!
//! A handler validates its input before anything else runs, builds one
//! `AdministrativeRequest` and passes it to the [`Dispatcher`]. Database-backed
//! requests open a fresh connection scope, run their catalog calls in order and
//! release the scope before the response is encoded.
//!
//! # Usage
//!
//! ```rust,ignore
//! use clusteradm::config::AdminConfig;
//! use clusteradm::server::{start_server, Dispatcher};
//!
//! let config = AdminConfig::new(&None)?;
//! let dispatcher = Dispatcher::from_config(&config);
//! start_server(dispatcher, &config.bind_address()).await?;
//! ```

pub mod handler;
pub mod handlers;
pub mod protocol;
pub mod router;

// Re-export commonly used types
pub use handler::{ApiError, ApiResult};
pub use protocol::{Envelope, ErrorCode};
pub use router::{AdminOutcome, AdministrativeRequest, Dispatcher};

use axum::routing::{delete, get, post};
use axum::Router as AxumRouter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// Server State
// =============================================================================

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Dispatcher executing administrative requests
    pub dispatcher: Arc<Dispatcher>,
}

impl ServerState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

// =============================================================================
// Axum Router Creation
// =============================================================================

/// Create the Axum router for the administrative API
pub fn create_axum_router(state: ServerState) -> AxumRouter {
    use handlers::{admin, databases, users};

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    AxumRouter::new()
        .route("/users/list", get(users::list))
        .route("/users/create", post(users::create))
        .route("/users/delete/:name", delete(users::delete))
        .route("/users/:name", get(users::find))
        .route("/databases/list", get(databases::list))
        .route("/databases/create", post(databases::create))
        .route("/databases/delete/:name", delete(databases::delete))
        .route("/databases/:name", get(databases::find))
        .route("/admin/failover", get(admin::failover))
        .route("/admin/restart", get(admin::restart))
        .route("/admin/settings", get(admin::settings))
        .route("/admin/role", post(admin::role))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}

// =============================================================================
// Server Startup
// =============================================================================

/// Start the HTTP server and run until ctrl-c
pub async fn start_server(dispatcher: Dispatcher, bind_address: &str) -> anyhow::Result<()> {
    let app = create_axum_router(ServerState::new(dispatcher));

    tracing::info!("Starting admin server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// =============================================================================
// Tests
// =============================================================================
