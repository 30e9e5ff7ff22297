#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! clusteradm - An HTTP control plane for a replicated PostgreSQL cluster
//!
//! clusteradm runs next to each PostgreSQL node and exposes a small JSON API for
//! managing roles and databases, asking peers for their replication role, and
//! restarting the local server. It can be used as both a command-line application
//! and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `cli` | The `clusteradm` binary | `clap`, `dotenvy`, `tracing-subscriber` |
//!
//! The library itself (server, database and cluster modules) is always available.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`database`]**: Administrative sessions
//!   - `admin`: `AdminSession` trait, user/database records, SQL quoting
//!   - `core`: request-scoped connections and the PostgreSQL implementation
//!
//! - **[`cluster`]**: Node-level actions
//!   - `role`: peer role probing over HTTP
//!   - `restart`: the fixed restart command
//!
//! - **[`server`]**: The HTTP API (routes, envelope, dispatcher)
//!
//! - **[`config`]**: Configuration management
//!
//! # Quick Start Examples
//!
//! ## Running the server
//!
//! ```rust,ignore
//! use clusteradm::{start_server, AdminConfig, Dispatcher};
//!
//! let config = AdminConfig::new(&None)?;
//! start_server(Dispatcher::from_config(&config), &config.bind_address()).await?;
//! ```
//!
//! ## Executing a request directly
//!
//! ```rust,ignore
//! use clusteradm::{AdminConfig, AdministrativeRequest, Dispatcher};
//!
//! let dispatcher = Dispatcher::from_config(&AdminConfig::new(&None)?);
//! let outcome = dispatcher
//!     .execute(AdministrativeRequest::FindUser { name: "app".to_string() })
//!     .await?;
//! println!("{:?}", outcome);
//! ```
//!
//! ## Probing a peer
//!
//! ```rust,ignore
//! use clusteradm::cluster::{PeerRoleProber, RoleProbe};
//! use std::time::Duration;
//!
//! let prober = PeerRoleProber::new(Duration::from_secs(5));
//! let role = prober.probe("fdaa:0:1::2".parse()?).await?;
//! println!("{}", role);
//! ```

pub mod cluster;
pub mod config;
pub mod database;
pub mod server;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{AdminConfig, DatabaseSettings};

// =============================================================================
// Database
// =============================================================================

pub use database::{
    AdminError, AdminResult, AdminSession, ConnectionError, ConnectionScope, Connector,
    DatabaseInfo, PgConnector, PgSession, UserInfo,
};

// =============================================================================
// Cluster
// =============================================================================

pub use cluster::{
    CommandRunner, PeerRoleProber, ProbeError, ProcessRunner, RestartError, RestartTrigger,
    RoleProbe, RoleProbeResult,
};

// =============================================================================
// Server
// =============================================================================

pub use server::{
    create_axum_router, start_server, AdminOutcome, AdministrativeRequest, ApiError, ApiResult,
    Dispatcher, Envelope, ErrorCode, ServerState,
};
