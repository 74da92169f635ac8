//! Owned application state shared by every handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::activities::Registry;
use crate::config::ServeConfig;
use crate::directory;
use crate::err::Error;
use crate::models::StaffAccount;
use crate::session::SessionStore;

#[derive(Debug)]
pub struct Service {
    users_path: PathBuf,
    pub sessions: SessionStore,
    pub registry: Registry,
}

impl Service {
    pub fn new(users_path: PathBuf, registry: Registry) -> Self {
        Self {
            users_path,
            sessions: SessionStore::new(),
            registry,
        }
    }

    /// Seeds the catalog and checks the user directory is readable.
    pub async fn start(config: &ServeConfig) -> Result<Arc<Self>, Error> {
        let accounts = directory::load(&config.users_path).await?;
        log::info!(
            "Loaded {} staff accounts from {}",
            accounts.len(),
            config.users_path.display()
        );
        let service = Self::new(config.users_path.clone(), Registry::seeded());
        log::info!("Serving {} activities", service.registry.list().len());
        Ok(Arc::new(service))
    }

    /// Fresh read of the directory; edits are picked up on the next login.
    pub async fn accounts(&self) -> Result<Vec<StaffAccount>, Error> {
        directory::load(&self.users_path).await
    }

    pub fn stop(&self) {
        let dropped = self.sessions.clear();
        log::info!("Shutting down, dropped {} sessions", dropped);
    }
}
