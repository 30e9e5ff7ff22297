//! PostgreSQL administrative sessions
//!
//! `PgConnector` opens one `tokio-postgres` session per request against the
//! cluster-local proxy described by [`DatabaseSettings`]. `PgSession` implements the
//! catalog operations on top of it.

use crate::config::DatabaseSettings;
use crate::database::admin::{
    quote_ident, quote_literal, AdminError, AdminResult, AdminSession, DatabaseInfo, UserInfo,
};
use crate::database::core::connection::{ConnectionError, Connector};
use async_trait::async_trait;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};

const USER_QUERY: &str = r#"
SELECT u.usename::text,
       u.usesuper,
       ARRAY(SELECT d.datname::text
             FROM pg_database d
             WHERE NOT d.datistemplate
               AND has_database_privilege(u.usename, d.datname, 'CREATE')
             ORDER BY d.datname)
FROM pg_user u"#;

const DATABASE_QUERY: &str = r#"
SELECT d.datname::text,
       ARRAY(SELECT u.usename::text
             FROM pg_user u
             WHERE has_database_privilege(u.usename, d.datname, 'CREATE')
             ORDER BY u.usename)
FROM pg_database d
WHERE NOT d.datistemplate"#;

/// Opens administrative sessions from injected settings
#[derive(Debug, Clone)]
pub struct PgConnector {
    settings: DatabaseSettings,
}

impl PgConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    fn pg_config(&self) -> Result<tokio_postgres::Config, ConnectionError> {
        let s = &self.settings;
        if s.host.trim().is_empty() {
            return Err(ConnectionError::Discovery(
                "no database host configured".to_string(),
            ));
        }
        if s.password.is_empty() {
            return Err(ConnectionError::Discovery(format!(
                "no password configured for {}",
                s.user
            )));
        }

        let mut config = tokio_postgres::Config::new();
        config
            .host(&s.host)
            .port(s.port)
            .user(&s.user)
            .password(&s.password)
            .dbname(&s.dbname)
            .application_name("clusteradm")
            .connect_timeout(s.connect_timeout);
        Ok(config)
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, ConnectionError> {
        let config = self.pg_config()?;
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        // The connection object drives the socket; it finishes once the client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("administrative connection closed with error: {}", e);
            }
        });

        Ok(Box::new(PgSession {
            client: Some(client),
        }))
    }
}

/// One live administrative session
pub struct PgSession {
    client: Option<Client>,
}

impl PgSession {
    fn client(&self) -> AdminResult<&Client> {
        self.client.as_ref().ok_or(AdminError::SessionClosed)
    }

    async fn execute(&self, statement: &str) -> AdminResult<()> {
        self.client()?
            .batch_execute(statement)
            .await
            .map_err(map_pg_error)
    }
}

/// Map a server error to [`AdminError`], keeping the server's message verbatim.
fn map_pg_error(e: tokio_postgres::Error) -> AdminError {
    match e.as_db_error() {
        Some(db) => {
            let code = db.code();
            if *code == SqlState::UNDEFINED_OBJECT || *code == SqlState::INVALID_CATALOG_NAME {
                AdminError::NotFound(db.message().to_string())
            } else {
                AdminError::Failed(db.message().to_string())
            }
        }
        None => AdminError::Failed(e.to_string()),
    }
}

fn user_from_row(row: &Row) -> AdminResult<UserInfo> {
    Ok(UserInfo {
        username: row.try_get(0).map_err(map_pg_error)?,
        superuser: row.try_get(1).map_err(map_pg_error)?,
        databases: row.try_get(2).map_err(map_pg_error)?,
    })
}

fn database_from_row(row: &Row) -> AdminResult<DatabaseInfo> {
    Ok(DatabaseInfo {
        name: row.try_get(0).map_err(map_pg_error)?,
        users: row.try_get(1).map_err(map_pg_error)?,
    })
}

#[async_trait]
impl AdminSession for PgSession {
    async fn create_user(&self, username: &str, password: &str) -> AdminResult<()> {
        self.execute(&format!(
            "CREATE USER {} WITH LOGIN PASSWORD {}",
            quote_ident(username),
            quote_literal(password)
        ))
        .await
    }

    async fn delete_user(&self, username: &str) -> AdminResult<()> {
        self.execute(&format!("DROP USER {}", quote_ident(username)))
            .await
    }

    async fn find_user(&self, username: &str) -> AdminResult<UserInfo> {
        let sql = format!("{} WHERE u.usename = $1", USER_QUERY);
        let row = self
            .client()?
            .query_opt(sql.as_str(), &[&username])
            .await
            .map_err(map_pg_error)?
            .ok_or_else(|| AdminError::user_not_found(username))?;
        user_from_row(&row)
    }

    async fn list_users(&self) -> AdminResult<Vec<UserInfo>> {
        let sql = format!("{} ORDER BY u.usename", USER_QUERY);
        let rows = self
            .client()?
            .query(sql.as_str(), &[])
            .await
            .map_err(map_pg_error)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn grant_access(&self, username: &str, database: &str) -> AdminResult<()> {
        self.execute(&format!(
            "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
            quote_ident(database),
            quote_ident(username)
        ))
        .await
    }

    async fn grant_superuser(&self, username: &str) -> AdminResult<()> {
        self.execute(&format!("ALTER USER {} WITH SUPERUSER", quote_ident(username)))
            .await
    }

    async fn create_database(&self, name: &str) -> AdminResult<()> {
        self.execute(&format!("CREATE DATABASE {}", quote_ident(name)))
            .await
    }

    async fn delete_database(&self, name: &str) -> AdminResult<()> {
        self.execute(&format!("DROP DATABASE {}", quote_ident(name)))
            .await
    }

    async fn find_database(&self, name: &str) -> AdminResult<DatabaseInfo> {
        let sql = format!("{} AND d.datname = $1", DATABASE_QUERY);
        let row = self
            .client()?
            .query_opt(sql.as_str(), &[&name])
            .await
            .map_err(map_pg_error)?
            .ok_or_else(|| AdminError::database_not_found(name))?;
        database_from_row(&row)
    }

    async fn list_databases(&self) -> AdminResult<Vec<DatabaseInfo>> {
        let sql = format!("{} ORDER BY d.datname", DATABASE_QUERY);
        let rows = self
            .client()?
            .query(sql.as_str(), &[])
            .await
            .map_err(map_pg_error)?;
        rows.iter().map(database_from_row).collect()
    }

    fn close(&mut self) {
        // Dropping the client sends Terminate and lets the driver task finish.
        drop(self.client.take());
    }
}
