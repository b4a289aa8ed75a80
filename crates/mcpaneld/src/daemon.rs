//! Main daemon orchestration

use chrono::{Local, Utc};
use mcpanel_core::{PanelConfig, Result};
use mcpanel_db::Database;
use mcpanel_ping::{Pinger, SlpPinger};
use mcpanel_runtime::HostSampler;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::backup::{BackupEngine, TarGzArchiver};
use crate::dispatcher::Dispatcher;
use crate::history::HistoryEngine;
use crate::registry::ServerRegistry;
use crate::scheduler::Scheduler;
use crate::supervisor::SupervisorContext;
use crate::transfer::{DisabledTransfer, TransferService};
use crate::watchdog;

const DECISION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Main daemon struct
pub struct Daemon {
    config: Arc<PanelConfig>,
    db: Database,
    registry: Arc<ServerRegistry>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<Scheduler>,
    transfer: Arc<dyn TransferService>,
    exit: Arc<Notify>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    /// Create a new daemon instance
    pub async fn new(config: PanelConfig) -> Result<Self> {
        let config = Arc::new(config);

        let db = Database::new(&config.db_path).await?;
        info!("Database initialized at {}", config.db_path.display());

        mcpanel_logs::ensure_log_dir(&config.logs_dir)?;
        std::fs::create_dir_all(&config.status_dir)?;

        let pinger: Arc<dyn Pinger> =
            Arc::new(SlpPinger::new(Duration::from_millis(config.ping.timeout_ms)));
        let host = Arc::new(Mutex::new(HostSampler::new()));
        let ctx = SupervisorContext {
            db: db.clone(),
            config: Arc::clone(&config),
            pinger: Arc::clone(&pinger),
            host: Arc::clone(&host),
        };
        let registry = Arc::new(ServerRegistry::load(ctx).await?);

        let backups = Arc::new(BackupEngine::new(
            db.clone(),
            Arc::clone(&registry),
            Arc::new(TarGzArchiver),
        ));
        let history = Arc::new(HistoryEngine::new(
            db.clone(),
            Arc::clone(&registry),
            pinger,
            host,
        ));
        let scheduler = Arc::new(Scheduler::new(
            db.clone(),
            Arc::clone(&registry),
            Arc::clone(&backups),
            history,
        ));
        let transfer: Arc<dyn TransferService> = Arc::new(DisabledTransfer);
        let exit = Arc::new(Notify::new());
        let dispatcher = Arc::new(Dispatcher::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&registry),
            backups,
            Arc::clone(&scheduler),
            Arc::clone(&transfer),
            Arc::clone(&exit),
        ));

        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            db,
            registry,
            dispatcher,
            scheduler,
            transfer,
            exit,
            shutdown_tx,
        })
    }

    /// Run until an exit command arrives
    pub async fn run(&self) -> Result<()> {
        self.dispatcher.clear_stale().await?;

        let now = Local::now().naive_local();
        self.scheduler.sync_history_job(now).await?;
        self.scheduler.reload_user_jobs(now).await?;

        let orphans = self.registry.check_orphans();
        if orphans > 0 {
            warn!(
                "Found {} orphaned server process(es); confirm_decision kills, decline_decision keeps",
                orphans
            );
        }

        tokio::spawn(watchdog::autostart(Arc::clone(&self.registry)));
        self.spawn_loops();

        info!("Daemon running, polling the command slot...");
        self.exit.notified().await;
        Ok(())
    }

    fn spawn_loops(&self) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.run(rx).await });

        let scheduler = Arc::clone(&self.scheduler);
        let rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { scheduler.run(rx).await });

        tokio::spawn(watchdog::run_watchdog(
            Arc::clone(&self.registry),
            Duration::from_secs(self.config.supervisor.watchdog_interval_secs),
            self.shutdown_tx.subscribe(),
        ));

        self.spawn_status_publisher();
        self.spawn_decision_resolver();
    }

    /// Periodically rewrite every server's status artifact
    fn spawn_status_publisher(&self) {
        let registry = Arc::clone(&self.registry);
        let interval = Duration::from_secs(self.config.supervisor.status_interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        for supervisor in registry.all() {
                            if let Err(e) = supervisor.publish_status().await {
                                warn!("Failed to publish status for server {}: {}", supervisor.id(), e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Apply the configured policy to decisions past their deadline
    fn spawn_decision_resolver(&self) {
        let registry = Arc::clone(&self.registry);
        let policy = self.config.decisions.policy;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(DECISION_CHECK_INTERVAL) => {
                        for supervisor in registry.all() {
                            match supervisor.resolve_expired(policy, Utc::now()).await {
                                Ok(Some(decision)) => debug!("Decision {} resolved by policy", decision.id),
                                Ok(None) => {}
                                Err(e) => warn!("Failed to resolve decision for server {}: {}", supervisor.id(), e),
                            }
                        }
                    }
                }
            }
        });
    }

    /// Stop background loops and every running server
    pub async fn shutdown(&self) {
        info!("Shutting down...");
        let _ = self.shutdown_tx.send(());

        let left = self.registry.stop_all().await;
        if !left.is_empty() {
            warn!("Servers {:?} did not stop and were left running", left);
        }
        if let Err(e) = self.transfer.stop().await {
            warn!("Failed to stop file-transfer service: {}", e);
        }
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpanel_core::{CommandKind, RemoteCommand};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PanelConfig {
        let mut config = PanelConfig {
            db_path: dir.path().join("mcpanel.db"),
            status_dir: dir.path().join("web_temp"),
            logs_dir: dir.path().join("logs"),
            ..PanelConfig::default()
        };
        config.dispatcher.poll_interval_ms = 50;
        config
    }

    #[tokio::test]
    async fn test_exit_command_ends_run() {
        let dir = TempDir::new().unwrap();
        let daemon = Arc::new(Daemon::new(config(&dir)).await.unwrap());
        assert!(dir.path().join("web_temp").is_dir());

        // Stale rows from a previous run are discarded, not executed
        let db = Database::new(&dir.path().join("mcpanel.db")).await.unwrap();
        db.remote()
            .submit(&RemoteCommand::new(CommandKind::BackupAll, 0, "stale"))
            .await
            .unwrap();

        let running = Arc::clone(&daemon);
        let handle = tokio::spawn(async move { running.run().await });

        let mut submitted = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if db
                .remote()
                .submit(&RemoteCommand::new(CommandKind::ExitPanel, 0, "test"))
                .await
                .unwrap()
            {
                submitted = true;
                break;
            }
        }
        assert!(submitted);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        daemon.shutdown().await;
    }
}
