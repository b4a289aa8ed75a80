//! Remote command dispatcher
//!
//! Polls the single-slot mailbox. A found command runs to completion
//! before the slot is cleared, so at most one privileged operation is in
//! flight and submissions made meanwhile are refused by the store.

use chrono::Local;
use mcpanel_core::{CommandKind, Error, PanelConfig, RemoteCommand, Result};
use mcpanel_db::Database;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::backup::BackupEngine;
use crate::registry::ServerRegistry;
use crate::scheduler::Scheduler;
use crate::supervisor::StopOutcome;
use crate::transfer::TransferService;

pub struct Dispatcher {
    db: Database,
    config: Arc<PanelConfig>,
    registry: Arc<ServerRegistry>,
    backups: Arc<BackupEngine>,
    scheduler: Arc<Scheduler>,
    transfer: Arc<dyn TransferService>,
    exit: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        config: Arc<PanelConfig>,
        registry: Arc<ServerRegistry>,
        backups: Arc<BackupEngine>,
        scheduler: Arc<Scheduler>,
        transfer: Arc<dyn TransferService>,
        exit: Arc<Notify>,
    ) -> Self {
        Self {
            db,
            config,
            registry,
            backups,
            scheduler,
            transfer,
            exit,
        }
    }

    /// Drop whatever a previous run left in the slot
    pub async fn clear_stale(&self) -> Result<()> {
        let cleared = self.db.remote().clear().await?;
        if cleared > 0 {
            warn!("Discarded {} stale command(s) from the slot", cleared);
        }
        Ok(())
    }

    /// Execute the pending command, if any, then clear the slot.
    ///
    /// Returns the command that was executed; an undecodable row is
    /// logged and cleared without running anything.
    pub async fn poll_once(&self) -> Result<Option<RemoteCommand>> {
        let entry = match self.db.remote().peek().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(e @ Error::InvalidCommand(_)) => {
                warn!("Discarding command slot row: {}", e);
                self.db.remote().clear().await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let executed = match entry.to_command() {
            Ok(command) => {
                info!(
                    "Executing {} for server {} (from {})",
                    command.kind, command.server_id, command.source
                );
                if let Err(e) = self.execute(&command).await {
                    error!(
                        "Command {} for server {} failed: {}",
                        command.kind, command.server_id, e
                    );
                }
                Some(command)
            }
            Err(e) => {
                warn!("Ignoring command from {}: {}", entry.source, e);
                None
            }
        };

        self.db.remote().clear().await?;
        Ok(executed)
    }

    async fn execute(&self, command: &RemoteCommand) -> Result<()> {
        let id = command.server_id;

        match command.kind {
            CommandKind::StartServer => {
                let supervisor = self.registry.get(id)?;
                supervisor.start().await?;

                let settle = self.config.supervisor.restart_settle();
                tokio::spawn(async move {
                    tokio::time::sleep(settle).await;
                    if let Err(e) = supervisor.publish_status().await {
                        warn!("Failed to publish status for server {}: {}", supervisor.id(), e);
                    }
                });
            }
            CommandKind::StopServer => {
                let outcome = self.registry.get(id)?.stop().await?;
                log_stop(id, outcome);
            }
            CommandKind::RestartServer => {
                let outcome = self
                    .registry
                    .get(id)?
                    .restart_when_quiet(self.config.dispatcher.ping_settle_timeout())
                    .await?;
                log_stop(id, outcome);
            }
            CommandKind::StartFtp => self.transfer.start().await?,
            CommandKind::StopFtp => self.transfer.stop().await?,
            CommandKind::BackupServer => {
                let report = self.backups.backup(id, true).await?;
                if let Some(e) = report.error {
                    warn!("Backup of server {} finished without an archive: {}", id, e);
                }
            }
            CommandKind::BackupAll => {
                let written = self.backups.backup_all(true).await;
                info!("Backed up {} server(s)", written);
            }
            CommandKind::ReloadSettings => {
                if id != 0 {
                    self.registry.reload_settings(id).await?;
                }
                self.scheduler
                    .sync_history_job(Local::now().naive_local())
                    .await?;
            }
            CommandKind::ReloadSchedules => {
                self.scheduler
                    .reload_user_jobs(Local::now().naive_local())
                    .await?;
            }
            CommandKind::ConfirmDecision => {
                let decision = self.registry.get(id)?.resolve_decision(true).await?;
                info!("Decision {} confirmed", decision.id);
            }
            CommandKind::DeclineDecision => {
                let decision = self.registry.get(id)?.resolve_decision(false).await?;
                info!("Decision {} declined", decision.id);
            }
            CommandKind::ExitPanel => {
                info!("Exit requested by {}", command.source);
                self.exit.notify_one();
            }
        }
        Ok(())
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.dispatcher.poll_interval();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Dispatcher stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.poll_once().await {
                        error!("Command slot poll failed: {}", e);
                    }
                }
            }
        }
    }
}

fn log_stop(server_id: u32, outcome: StopOutcome) {
    match outcome {
        StopOutcome::Unresponsive { decision_id } => warn!(
            "Server {} did not stop; decision {} is waiting for confirm_decision or decline_decision",
            server_id, decision_id
        ),
        StopOutcome::NotRunning => info!("Server {} was not running", server_id),
        StopOutcome::Stopped => {}
    }
}
