//! Request-scoped connection management
//!
//! Every database-backed request acquires its own [`ConnectionScope`]. The scope owns
//! exactly one administrative session and releases it exactly once: either through
//! [`ConnectionScope::release`] or, on early return / cancellation / unwinding,
//! when the scope is dropped.

use crate::database::admin::AdminSession;
use async_trait::async_trait;
use std::ops::Deref;
use std::time::Duration;

/// Errors raised while acquiring an administrative session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Host or credentials could not be resolved
    Discovery(String),
    /// The server could not be reached or refused the session
    Connect(String),
    /// Acquisition did not finish in time
    TimedOut(Duration),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Discovery(e) => write!(f, "node discovery failed: {}", e),
            ConnectionError::Connect(e) => write!(f, "failed to connect: {}", e),
            ConnectionError::TimedOut(d) => write!(
                f,
                "timed out acquiring connection after {}",
                humantime::format_duration(*d)
            ),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Source of fresh administrative sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, ConnectionError>;
}

/// Exclusively-owned administrative session bound to one request
pub struct ConnectionScope {
    session: Box<dyn AdminSession>,
    released: bool,
}

impl ConnectionScope {
    /// Acquire a fresh session from `connector`, bounded by `timeout`.
    ///
    /// Dropping the returned future before it resolves abandons the attempt
    /// without leaving a session behind.
    pub async fn acquire(
        connector: &dyn Connector,
        timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let session = tokio::time::timeout(timeout, connector.connect())
            .await
            .map_err(|_| ConnectionError::TimedOut(timeout))??;
        tracing::debug!("administrative session acquired");
        Ok(Self {
            session,
            released: false,
        })
    }

    /// Release the session. Consumes the scope, so it cannot be released twice.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.session.close();
        tracing::debug!("administrative session released");
    }
}

impl Deref for ConnectionScope {
    type Target = dyn AdminSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.release_once();
    }
}
