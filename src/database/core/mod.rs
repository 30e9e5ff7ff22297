//! Core database infrastructure
//!
//! - `ConnectionScope`: request-scoped administrative session with single release
//! - `Connector`: source of fresh sessions
//! - `PgConnector` / `PgSession`: PostgreSQL implementation over `tokio-postgres`

pub(crate) mod connection;
mod postgres;

pub use connection::{ConnectionError, ConnectionScope, Connector};
pub use postgres::{PgConnector, PgSession};
