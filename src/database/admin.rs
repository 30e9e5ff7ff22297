//! Catalog administration primitives
//!
//! This module defines the [`AdminSession`] trait: the set of user/database catalog
//! operations a live administrative session exposes, together with the records
//! they return and the error type they fail with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A database role as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub superuser: bool,
    /// Databases the role holds `CREATE` privileges on
    pub databases: Vec<String>,
}

/// A (non-template) database as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    /// Roles holding `CREATE` privileges on this database
    pub users: Vec<String>,
}

/// Errors returned by catalog operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// The named user or database does not exist
    NotFound(String),
    /// The server rejected the operation; carries its message verbatim
    Failed(String),
    /// The session was used after it had been closed
    SessionClosed,
}

impl AdminError {
    pub fn user_not_found(name: &str) -> Self {
        AdminError::NotFound(format!("user {} not found", name))
    }

    pub fn database_not_found(name: &str) -> Self {
        AdminError::NotFound(format!("database {} not found", name))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound(_))
    }
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::NotFound(message) => write!(f, "{}", message),
            AdminError::Failed(message) => write!(f, "{}", message),
            AdminError::SessionClosed => write!(f, "administrative session already closed"),
        }
    }
}

impl std::error::Error for AdminError {}

pub type AdminResult<T> = Result<T, AdminError>;

/// Catalog operations available on one live administrative session.
///
/// Implementations own exactly one server session. `close` is called by
/// [`ConnectionScope`](crate::database::ConnectionScope) exactly once.
#[async_trait]
pub trait AdminSession: Send + Sync {
    async fn create_user(&self, username: &str, password: &str) -> AdminResult<()>;

    async fn delete_user(&self, username: &str) -> AdminResult<()>;

    async fn find_user(&self, username: &str) -> AdminResult<UserInfo>;

    async fn list_users(&self) -> AdminResult<Vec<UserInfo>>;

    async fn grant_access(&self, username: &str, database: &str) -> AdminResult<()>;

    async fn grant_superuser(&self, username: &str) -> AdminResult<()>;

    async fn create_database(&self, name: &str) -> AdminResult<()>;

    async fn delete_database(&self, name: &str) -> AdminResult<()>;

    async fn find_database(&self, name: &str) -> AdminResult<DatabaseInfo>;

    async fn list_databases(&self) -> AdminResult<Vec<DatabaseInfo>>;

    /// Tear down the server session.
    fn close(&mut self);
}

/// Quote an SQL identifier, doubling embedded double quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("app"), "\"app\"");
        assert_eq!(quote_ident("Mixed Case"), "\"Mixed Case\"");
        assert_eq!(quote_ident("a\"; DROP"), "\"a\"\"; DROP\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("pass"), "'pass'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_admin_error_display() {
        assert_eq!(
            AdminError::user_not_found("bob").to_string(),
            "user bob not found"
        );
        assert_eq!(
            AdminError::Failed("role \"bob\" already exists".to_string()).to_string(),
            "role \"bob\" already exists"
        );
        assert!(AdminError::database_not_found("app").is_not_found());
        assert!(!AdminError::SessionClosed.is_not_found());
    }

    #[test]
    fn test_user_info_serialization() {
        let user = UserInfo {
            username: "app".to_string(),
            superuser: false,
            databases: vec!["appdb".to_string()],
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"username": "app", "superuser": false, "databases": ["appdb"]})
        );
    }
}
