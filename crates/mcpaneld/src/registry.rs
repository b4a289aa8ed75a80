//! The set of supervised servers

use mcpanel_core::{Error, Result, ServerSettings};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::supervisor::{StopOutcome, Supervisor, SupervisorContext};

pub struct ServerRegistry {
    ctx: SupervisorContext,
    servers: RwLock<BTreeMap<u32, Arc<Supervisor>>>,
}

impl ServerRegistry {
    pub fn new(ctx: SupervisorContext) -> Self {
        Self {
            ctx,
            servers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a supervisor for every server in the settings store
    pub async fn load(ctx: SupervisorContext) -> Result<Self> {
        let registry = Self::new(ctx);
        let servers = registry.ctx.db.servers().get_all().await?;
        for settings in servers {
            registry.insert(settings);
        }
        info!("Loaded {} server(s)", registry.servers.read().len());
        Ok(registry)
    }

    pub fn insert(&self, settings: ServerSettings) -> Arc<Supervisor> {
        let id = settings.id;
        let supervisor = Arc::new(Supervisor::new(settings, self.ctx.clone()));
        self.servers.write().insert(id, Arc::clone(&supervisor));
        supervisor
    }

    pub fn get(&self, id: u32) -> Result<Arc<Supervisor>> {
        self.servers
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::ServerNotFound(id))
    }

    pub fn all(&self) -> Vec<Arc<Supervisor>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.servers.read().keys().copied().collect()
    }

    /// Re-read one server's settings, registering it if it is new
    pub async fn reload_settings(&self, id: u32) -> Result<Arc<Supervisor>> {
        if let Ok(supervisor) = self.get(id) {
            supervisor.reload_settings().await?;
            return Ok(supervisor);
        }

        let settings = self
            .ctx
            .db
            .servers()
            .get_by_id(id)
            .await?
            .ok_or(Error::ServerNotFound(id))?;
        info!("Registered new server {} ({})", id, settings.name);
        Ok(self.insert(settings))
    }

    /// Gracefully stop every server; returns the ids left running
    pub async fn stop_all(&self) -> Vec<u32> {
        let mut unresponsive = Vec::new();
        for supervisor in self.all() {
            match supervisor.stop().await {
                Ok(StopOutcome::Unresponsive { .. }) => unresponsive.push(supervisor.id()),
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to stop server {}: {}", supervisor.id(), e);
                    if supervisor.check_running() {
                        unresponsive.push(supervisor.id());
                    }
                }
            }
        }
        unresponsive
    }

    /// Orphan scan across all servers; returns the total found
    pub fn check_orphans(&self) -> usize {
        self.all()
            .iter()
            .map(|s| match s.check_orphaned_server() {
                Ok(count) => count,
                Err(e) => {
                    warn!("Orphan check for server {} failed: {}", s.id(), e);
                    0
                }
            })
            .sum()
    }
}
