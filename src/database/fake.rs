//! In-memory collaborators for tests
//!
//! `FakeConnector` hands out `FakeSession`s that share one catalog and one call log,
//! and counts how many sessions were acquired and released.

use crate::database::admin::{AdminError, AdminResult, AdminSession, DatabaseInfo, UserInfo};
use crate::database::core::connection::{ConnectionError, Connector};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Catalog {
    users: BTreeMap<String, UserInfo>,
    databases: BTreeMap<String, DatabaseInfo>,
}

#[derive(Clone, Default)]
struct Shared {
    catalog: Arc<Mutex<Catalog>>,
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<HashSet<&'static str>>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    shared: Shared,
    fail_connect: bool,
    connect_delay: Option<Duration>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operations (e.g. `"grant_access"`) fail.
    pub fn failing(mut self, ops: &[&'static str]) -> Self {
        self.shared.failing = Arc::new(ops.iter().copied().collect());
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn with_user(self, username: &str, superuser: bool) -> Self {
        if let Ok(mut catalog) = self.shared.catalog.lock() {
            catalog.users.insert(
                username.to_string(),
                UserInfo {
                    username: username.to_string(),
                    superuser,
                    databases: vec![],
                },
            );
        }
        self
    }

    pub fn with_database(self, name: &str) -> Self {
        if let Ok(mut catalog) = self.shared.catalog.lock() {
            catalog.databases.insert(
                name.to_string(),
                DatabaseInfo {
                    name: name.to_string(),
                    users: vec![],
                },
            );
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn user(&self, username: &str) -> Option<UserInfo> {
        self.shared
            .catalog
            .lock()
            .unwrap()
            .users
            .get(username)
            .cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn AdminSession>, ConnectionError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect {
            return Err(ConnectionError::Connect("connection refused".to_string()));
        }
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            shared: self.shared.clone(),
        }))
    }
}

pub struct FakeSession {
    shared: Shared,
}

impl FakeSession {
    fn record(&self, op: &'static str) -> AdminResult<()> {
        self.shared.calls.lock().unwrap().push(op.to_string());
        if self.shared.failing.contains(op) {
            return Err(AdminError::Failed(format!("{} rejected by server", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminSession for FakeSession {
    async fn create_user(&self, username: &str, _password: &str) -> AdminResult<()> {
        self.record("create_user")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        if catalog.users.contains_key(username) {
            return Err(AdminError::Failed(format!(
                "role \"{}\" already exists",
                username
            )));
        }
        catalog.users.insert(
            username.to_string(),
            UserInfo {
                username: username.to_string(),
                superuser: false,
                databases: vec![],
            },
        );
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> AdminResult<()> {
        self.record("delete_user")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        catalog
            .users
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| AdminError::user_not_found(username))
    }

    async fn find_user(&self, username: &str) -> AdminResult<UserInfo> {
        self.record("find_user")?;
        let catalog = self.shared.catalog.lock().unwrap();
        catalog
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| AdminError::user_not_found(username))
    }

    async fn list_users(&self) -> AdminResult<Vec<UserInfo>> {
        self.record("list_users")?;
        let catalog = self.shared.catalog.lock().unwrap();
        Ok(catalog.users.values().cloned().collect())
    }

    async fn grant_access(&self, username: &str, database: &str) -> AdminResult<()> {
        self.record("grant_access")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        if !catalog.databases.contains_key(database) {
            return Err(AdminError::database_not_found(database));
        }
        let user = catalog
            .users
            .get_mut(username)
            .ok_or_else(|| AdminError::user_not_found(username))?;
        user.databases.push(database.to_string());
        Ok(())
    }

    async fn grant_superuser(&self, username: &str) -> AdminResult<()> {
        self.record("grant_superuser")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        let user = catalog
            .users
            .get_mut(username)
            .ok_or_else(|| AdminError::user_not_found(username))?;
        user.superuser = true;
        Ok(())
    }

    async fn create_database(&self, name: &str) -> AdminResult<()> {
        self.record("create_database")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        if catalog.databases.contains_key(name) {
            return Err(AdminError::Failed(format!(
                "database \"{}\" already exists",
                name
            )));
        }
        catalog.databases.insert(
            name.to_string(),
            DatabaseInfo {
                name: name.to_string(),
                users: vec![],
            },
        );
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> AdminResult<()> {
        self.record("delete_database")?;
        let mut catalog = self.shared.catalog.lock().unwrap();
        catalog
            .databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdminError::database_not_found(name))
    }

    async fn find_database(&self, name: &str) -> AdminResult<DatabaseInfo> {
        self.record("find_database")?;
        let catalog = self.shared.catalog.lock().unwrap();
        catalog
            .databases
            .get(name)
            .cloned()
            .ok_or_else(|| AdminError::database_not_found(name))
    }

    async fn list_databases(&self) -> AdminResult<Vec<DatabaseInfo>> {
        self.record("list_databases")?;
        let catalog = self.shared.catalog.lock().unwrap();
        Ok(catalog.databases.values().cloned().collect())
    }

    fn close(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}
