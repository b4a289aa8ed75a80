//! Periodic resource and player sampling

use chrono::{DateTime, Utc};
use mcpanel_core::{HistorySample, Result};
use mcpanel_db::Database;
use mcpanel_ping::Pinger;
use mcpanel_runtime::HostSampler;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::registry::ServerRegistry;

pub struct HistoryEngine {
    db: Database,
    registry: Arc<ServerRegistry>,
    pinger: Arc<dyn Pinger>,
    host: Arc<Mutex<HostSampler>>,
}

impl HistoryEngine {
    pub fn new(
        db: Database,
        registry: Arc<ServerRegistry>,
        pinger: Arc<dyn Pinger>,
        host: Arc<Mutex<HostSampler>>,
    ) -> Self {
        Self {
            db,
            registry,
            pinger,
            host,
        }
    }

    /// Record one sample for a server and prune samples past the max age
    pub async fn sample_server(&self, server_id: u32, now: DateTime<Utc>) -> Result<HistorySample> {
        let supervisor = self.registry.get(server_id)?;
        let host = self.host.lock().sample();

        let players = if supervisor.check_running() {
            let settings = supervisor.settings();
            match self.pinger.ping(&settings.server_ip, settings.server_port).await {
                Ok(status) => status.online,
                Err(e) => {
                    debug!("No player count for server {}: {}", server_id, e);
                    0
                }
            }
        } else {
            0
        };

        let sample = HistorySample {
            server_id,
            time: now,
            cpu: host.cpu_usage,
            memory: host.mem_percent,
            players,
        };
        self.db.history().insert(&sample).await?;

        let max_age = self.db.panel().get().await?.history_max_age;
        let cutoff = now - chrono::Duration::days(i64::from(max_age));
        let pruned = self.db.history().delete_older_than(cutoff).await?;
        if pruned > 0 {
            debug!("Pruned {} history samples older than {}", pruned, cutoff);
        }

        Ok(sample)
    }

    pub async fn sample_all(&self, now: DateTime<Utc>) {
        for id in self.registry.ids() {
            if let Err(e) = self.sample_server(id, now).await {
                warn!("History sample for server {} failed: {}", id, e);
            }
        }
    }
}
