//! Database module
//!
//! This module provides the administrative database access used by the HTTP facade:
//!
//! ```text
//! database/
//! ├── admin           # AdminSession trait, catalog records, AdminError
//! └── core/
//!     ├── connection  # Connector trait and request-scoped ConnectionScope
//!     └── postgres    # tokio-postgres backed Connector/AdminSession
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use clusteradm::database::{ConnectionScope, PgConnector};
//!
//! let connector = PgConnector::new(config.database.clone());
//! let scope = ConnectionScope::acquire(&connector, config.database.connect_timeout).await?;
//! let users = scope.list_users().await;
//! scope.release();
//! ```

pub mod admin;
pub mod core;

#[cfg(test)]
pub(crate) mod fake;

pub use admin::{
    quote_ident, quote_literal, AdminError, AdminResult, AdminSession, DatabaseInfo, UserInfo,
};
pub use core::{ConnectionError, ConnectionScope, Connector, PgConnector, PgSession};
