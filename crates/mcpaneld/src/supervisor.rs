//! Process supervisor - owns one game server process
//!
//! Each managed server gets its own `Supervisor`. Lifecycle operations
//! (start, stop, restart, decision resolution) and backups serialize on
//! the async lifecycle lock; the in-memory state sits behind a sync mutex
//! that is never held across an await.

use chrono::{DateTime, Utc};
use mcpanel_core::{
    constants, DecisionKind, DecisionPolicy, Error, PanelConfig, PendingDecision, Result,
    RuntimeProcessState, ServerSettings, ServerState, StatusSnapshot,
};
use mcpanel_db::Database;
use mcpanel_logs::{LogWriter, RotationConfig};
use mcpanel_ping::Pinger;
use mcpanel_runtime::{
    build_launch_command, kill_tree, pid_exists, stop_keyword, HostSampler, ProcessTable, PtyShell,
};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, error, info, warn};

use crate::decisions::DecisionBoard;
use crate::status;

/// Shared collaborators handed to every supervisor
#[derive(Clone)]
pub struct SupervisorContext {
    pub db: Database,
    pub config: Arc<PanelConfig>,
    pub pinger: Arc<dyn Pinger>,
    pub host: Arc<Mutex<HostSampler>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; a crash, if any, is now acknowledged
    NotRunning,
    Stopped,
    /// The server ignored its shutdown keyword and a force-kill decision is pending
    Unresponsive { decision_id: u64 },
}

struct Inner {
    settings: ServerSettings,
    launch_command: String,
    state: ServerState,
    process: Option<RuntimeProcessState>,
    shell: Option<PtyShell>,
    declined_orphans: HashSet<u32>,
}

pub struct Supervisor {
    server_id: u32,
    ctx: SupervisorContext,
    decisions: DecisionBoard,
    lifecycle: AsyncMutex<()>,
    inner: Mutex<Inner>,
}

impl Supervisor {
    pub fn new(settings: ServerSettings, ctx: SupervisorContext) -> Self {
        let launch_command = build_launch_command(&settings, &ctx.config.runtime.binary);
        let decisions = DecisionBoard::new(
            settings.id,
            Duration::from_secs(ctx.config.decisions.timeout_secs),
        );

        Self {
            server_id: settings.id,
            ctx,
            decisions,
            lifecycle: AsyncMutex::new(()),
            inner: Mutex::new(Inner {
                settings,
                launch_command,
                state: ServerState::Stopped,
                process: None,
                shell: None,
                declined_orphans: HashSet::new(),
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.server_id
    }

    pub fn settings(&self) -> ServerSettings {
        self.inner.lock().settings.clone()
    }

    pub fn state(&self) -> ServerState {
        self.inner.lock().state
    }

    pub fn process_state(&self) -> Option<RuntimeProcessState> {
        self.inner.lock().process.clone()
    }

    pub fn launch_command(&self) -> String {
        self.inner.lock().launch_command.clone()
    }

    pub fn pending_decision(&self) -> Option<PendingDecision> {
        self.decisions.pending()
    }

    pub(crate) fn decisions(&self) -> &DecisionBoard {
        &self.decisions
    }

    /// Serialize with lifecycle operations (used by the backup engine)
    pub async fn lock_lifecycle(&self) -> AsyncMutexGuard<'_, ()> {
        self.lifecycle.lock().await
    }

    /// Re-read settings from the store; takes effect on the next start
    pub async fn reload_settings(&self) -> Result<()> {
        let settings = self
            .ctx
            .db
            .servers()
            .get_by_id(self.server_id)
            .await?
            .ok_or(Error::ServerNotFound(self.server_id))?;
        self.apply_settings(settings);
        Ok(())
    }

    pub fn apply_settings(&self, settings: ServerSettings) {
        let launch_command = build_launch_command(&settings, &self.ctx.config.runtime.binary);
        let mut inner = self.inner.lock();
        info!(
            "Reloaded settings for server {} ({})",
            self.server_id, settings.name
        );
        debug!("Launch command: {}", launch_command);
        inner.settings = settings;
        inner.launch_command = launch_command;
    }

    fn transition(&self, inner: &mut Inner, to: ServerState) -> Result<()> {
        if !inner.state.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                server_id: self.server_id,
                from: inner.state,
                to,
            });
        }
        debug!("Server {}: {} -> {}", self.server_id, inner.state, to);
        inner.state = to;
        Ok(())
    }

    /// Whether the tracked process is still in the process table
    fn probe(inner: &mut Inner) -> bool {
        let Some(process) = inner.process.as_ref() else {
            return false;
        };

        if process.pid == process.shell_pid {
            // Our own child: reap it, or its pid lingers as a zombie
            match inner.shell.as_mut() {
                Some(shell) => matches!(shell.try_wait(), Ok(None)),
                None => false,
            }
        } else {
            pid_exists(process.pid)
        }
    }

    /// Liveness check against the OS process table.
    ///
    /// A dead process clears the runtime state and turns `Running` into
    /// `Crashed`.
    pub fn check_running(&self) -> bool {
        let shell = {
            let mut inner = self.inner.lock();
            if Self::probe(&mut inner) {
                return true;
            }
            if inner.process.take().is_none() {
                return false;
            }

            warn!("Server {} process is no longer running", self.server_id);
            match inner.state {
                ServerState::Running => {
                    if let Err(e) = self.transition(&mut inner, ServerState::Crashed) {
                        warn!("{}", e);
                    }
                    inner.shell.take()
                }
                // Stop polling gave up; the late exit completes that stop
                ServerState::Stopping if self.decisions.has_force_kill() => {
                    if let Some(decision) = self.decisions.take() {
                        info!(
                            "Server {} exited on its own, decision {} dropped",
                            self.server_id, decision.id
                        );
                    }
                    if let Err(e) = self.transition(&mut inner, ServerState::Stopped) {
                        warn!("{}", e);
                    }
                    inner.shell.take()
                }
                _ => None,
            }
        };

        // Dropping the shell kills it
        drop(shell);
        false
    }

    pub async fn start(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.start_locked().await
    }

    async fn start_locked(&self) -> Result<()> {
        self.check_running();

        if self.decisions.has_orphan() {
            return Err(Error::DecisionPending(self.server_id));
        }

        let (settings, launch_command) = {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, ServerState::Starting)?;
            (inner.settings.clone(), inner.launch_command.clone())
        };

        info!("Starting server {} ({})", self.server_id, settings.name);

        match self.spawn_runtime(&settings, &launch_command).await {
            Ok((shell, process)) => {
                let mut inner = self.inner.lock();
                info!(
                    "Server {} running with pid {} (shell {})",
                    self.server_id, process.pid, process.shell_pid
                );
                inner.process = Some(process);
                inner.shell = Some(shell);
                self.transition(&mut inner, ServerState::Running)?;
            }
            Err(e) => {
                error!("Failed to start server {}: {}", self.server_id, e);
                let mut inner = self.inner.lock();
                self.transition(&mut inner, ServerState::Stopped)?;
                return Err(e);
            }
        }

        if let Err(e) = self.publish_status().await {
            warn!("Failed to publish status for server {}: {}", self.server_id, e);
        }
        Ok(())
    }

    async fn spawn_runtime(
        &self,
        settings: &ServerSettings,
        launch_command: &str,
    ) -> Result<(PtyShell, RuntimeProcessState)> {
        let runtime = &self.ctx.config.runtime;
        mcpanel_runtime::prepare(settings, &runtime.binary)?;

        let (mut shell, reader) = PtyShell::spawn(&runtime.shell, &settings.server_path)?;

        let console = mcpanel_logs::console_path(&self.ctx.config.logs_dir, self.server_id);
        let writer = LogWriter::new(console, RotationConfig::default())?;
        mcpanel_logs::spawn_console_capture(reader, writer);

        shell.write_line(launch_command)?;
        let pid = self.resolve_pid(shell.pid()).await;

        let process = RuntimeProcessState {
            pid,
            shell_pid: shell.pid(),
            started_at: Utc::now(),
            launch_command: launch_command.to_string(),
        };
        Ok((shell, process))
    }

    /// Find the runtime process under the shell by name, falling back to
    /// the shell itself. A different process with the same name forked by
    /// the shell would be picked up instead.
    async fn resolve_pid(&self, shell_pid: u32) -> u32 {
        let name = &self.ctx.config.runtime.process_name;
        let deadline = Instant::now() + self.ctx.config.supervisor.pid_resolve_timeout();
        let mut table = ProcessTable::new();

        loop {
            if let Some(pid) = table.find_descendant(shell_pid, name) {
                return pid;
            }
            if Instant::now() >= deadline {
                warn!(
                    "No '{}' process under shell {}, tracking the shell instead",
                    name, shell_pid
                );
                return shell_pid;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            table.refresh();
        }
    }

    /// Write console text to the running server
    pub fn send_command(&self, text: &str) -> Result<()> {
        self.check_running();

        let mut inner = self.inner.lock();
        if inner.state != ServerState::Running {
            return Err(Error::NotRunning(self.server_id));
        }
        match inner.shell.as_mut() {
            Some(shell) => shell.write_line(text),
            None => Err(Error::NotRunning(self.server_id)),
        }
    }

    pub async fn stop(&self) -> Result<StopOutcome> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<StopOutcome> {
        if self.decisions.has_force_kill() {
            return Err(Error::DecisionPending(self.server_id));
        }

        if !self.check_running() {
            let shell = {
                let mut inner = self.inner.lock();
                if inner.state == ServerState::Crashed {
                    self.transition(&mut inner, ServerState::Stopped)?;
                    info!("Server {} crash acknowledged", self.server_id);
                }
                inner.shell.take()
            };
            if let Some(mut shell) = shell {
                shell.terminate().await;
            }
            return Ok(StopOutcome::NotRunning);
        }

        let pid = {
            let mut inner = self.inner.lock();
            let pid = match inner.process.as_ref() {
                Some(process) => process.pid,
                None => return Ok(StopOutcome::NotRunning),
            };
            self.transition(&mut inner, ServerState::Stopping)?;

            let keyword = stop_keyword(&inner.settings);
            info!("Stopping server {} with '{}'", self.server_id, keyword);
            let sent = match inner.shell.as_mut() {
                Some(shell) => shell.write_line(keyword),
                None => Err(Error::NotRunning(self.server_id)),
            };
            if let Err(e) = sent {
                self.transition(&mut inner, ServerState::Running)?;
                return Err(e);
            }
            pid
        };

        let timing = &self.ctx.config.supervisor;
        for attempt in 1..=timing.stop_poll_attempts {
            tokio::time::sleep(timing.stop_poll_interval()).await;
            if !Self::probe(&mut self.inner.lock()) {
                self.finish_stop().await;
                return Ok(StopOutcome::Stopped);
            }
            debug!(
                "Server {} still running ({}/{})",
                self.server_id, attempt, timing.stop_poll_attempts
            );
        }

        warn!(
            "Server {} ignored the shutdown keyword after {} checks",
            self.server_id, timing.stop_poll_attempts
        );
        match self.decisions.raise(DecisionKind::ForceKill { pid }) {
            Ok(decision) => Ok(StopOutcome::Unresponsive {
                decision_id: decision.id,
            }),
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.state == ServerState::Stopping {
                    self.transition(&mut inner, ServerState::Running)?;
                }
                Err(e)
            }
        }
    }

    async fn finish_stop(&self) {
        let shell = {
            let mut inner = self.inner.lock();
            inner.process = None;
            if let Err(e) = self.transition(&mut inner, ServerState::Stopped) {
                warn!("{}", e);
                inner.state = ServerState::Stopped;
            }
            inner.shell.take()
        };
        if let Some(mut shell) = shell {
            shell.terminate().await;
        }

        info!("Server {} stopped", self.server_id);
        if let Err(e) = self.publish_status().await {
            warn!("Failed to publish status for server {}: {}", self.server_id, e);
        }
    }

    /// Stop, settle, start. The start is skipped when the stop did not complete.
    pub async fn restart(&self) -> Result<StopOutcome> {
        self.restart_inner(None).await
    }

    /// Like [`restart`](Self::restart), additionally waiting (bounded) for
    /// the server to stop answering pings before starting again
    pub async fn restart_when_quiet(&self, quiet_timeout: Duration) -> Result<StopOutcome> {
        self.restart_inner(Some(quiet_timeout)).await
    }

    async fn restart_inner(&self, quiet_timeout: Option<Duration>) -> Result<StopOutcome> {
        let _guard = self.lifecycle.lock().await;

        let outcome = self.stop_locked().await?;
        if let StopOutcome::Unresponsive { .. } = outcome {
            warn!("Server {} did not stop, restart abandoned", self.server_id);
            return Ok(outcome);
        }

        if let Some(timeout) = quiet_timeout {
            self.wait_ping_quiet(timeout).await;
        }
        tokio::time::sleep(self.ctx.config.supervisor.restart_settle()).await;

        self.start_locked().await?;
        Ok(outcome)
    }

    async fn wait_ping_quiet(&self, timeout: Duration) {
        let (ip, port) = {
            let inner = self.inner.lock();
            (inner.settings.server_ip.clone(), inner.settings.server_port)
        };

        let deadline = Instant::now() + timeout;
        while self.ctx.pinger.ping(&ip, port).await.is_ok() {
            if Instant::now() >= deadline {
                warn!(
                    "Server {} still answers pings after {:?}",
                    self.server_id, timeout
                );
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Look for processes running this server's jar that nobody in this
    /// daemon owns; the first one found becomes a kill-orphan decision.
    ///
    /// Returns the number of orphans seen.
    pub fn check_orphaned_server(&self) -> Result<usize> {
        let (jar, declined) = {
            let inner = self.inner.lock();
            (inner.settings.server_jar.clone(), inner.declined_orphans.clone())
        };

        let table = ProcessTable::new();
        let owned = table.descendants(std::process::id());
        let orphans: Vec<_> = table
            .find_jar_processes(&self.ctx.config.runtime.process_name, &jar, &owned)
            .into_iter()
            .filter(|o| !declined.contains(&o.pid))
            .collect();

        for orphan in &orphans {
            warn!(
                "Server {}: untracked process {} is running {}: {}",
                self.server_id, orphan.pid, jar, orphan.cmdline
            );
        }

        if let Some(first) = orphans.first() {
            if self.decisions.pending().is_none() {
                self.decisions.raise(DecisionKind::KillOrphan {
                    pid: first.pid,
                    cmdline: first.cmdline.clone(),
                })?;
            }
        }

        Ok(orphans.len())
    }

    /// Apply an operator (or auto-policy) answer to the pending decision
    pub async fn resolve_decision(&self, confirm: bool) -> Result<PendingDecision> {
        let _guard = self.lifecycle.lock().await;
        let decision = self
            .decisions
            .take()
            .ok_or(Error::NoPendingDecision(self.server_id))?;

        match (&decision.kind, confirm) {
            (DecisionKind::ForceKill { pid }, true) => {
                warn!("Force killing server {} (pid {})", self.server_id, pid);
                kill_tree(*pid, Signal::SIGKILL);
                self.wait_for_exit(*pid).await;
                self.finish_stop().await;
            }
            (DecisionKind::ForceKill { pid }, false) => {
                let alive = Self::probe(&mut self.inner.lock());
                if alive {
                    warn!(
                        "Force kill declined, server {} left running (pid {})",
                        self.server_id, pid
                    );
                    let mut inner = self.inner.lock();
                    if inner.state == ServerState::Stopping {
                        self.transition(&mut inner, ServerState::Running)?;
                    }
                } else {
                    info!(
                        "Server {} exited before the force kill was answered",
                        self.server_id
                    );
                    self.finish_stop().await;
                }
            }
            (DecisionKind::KillOrphan { pid, .. }, true) => {
                warn!("Killing orphaned process {} of server {}", pid, self.server_id);
                kill_tree(*pid, Signal::SIGKILL);
                self.wait_for_exit(*pid).await;
                self.check_orphaned_server()?;
            }
            (DecisionKind::KillOrphan { pid, .. }, false) => {
                warn!(
                    "Orphaned process {} of server {} left running",
                    pid, self.server_id
                );
                self.inner.lock().declined_orphans.insert(*pid);
                self.check_orphaned_server()?;
            }
        }

        Ok(decision)
    }

    /// Resolve the pending decision with `policy` once its deadline passed
    pub async fn resolve_expired(
        &self,
        policy: DecisionPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingDecision>> {
        match self.decisions.pending() {
            Some(decision) if decision.is_expired(now) => {
                info!(
                    "Decision {} for server {} expired, applying {}",
                    decision.id,
                    self.server_id,
                    policy.as_str()
                );
                self.resolve_decision(policy == DecisionPolicy::AutoKill)
                    .await
                    .map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn wait_for_exit(&self, pid: u32) {
        for _ in 0..50 {
            let gone = {
                let mut inner = self.inner.lock();
                let is_shell = inner.process.as_ref().map(|p| p.shell_pid) == Some(pid);
                if is_shell {
                    !Self::probe(&mut inner)
                } else {
                    !pid_exists(pid)
                }
            };
            if gone {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        warn!("Process {} still present after kill", pid);
    }

    /// Build the status snapshot and overwrite the artifact
    pub async fn publish_status(&self) -> Result<StatusSnapshot> {
        let running = self.check_running();
        let (settings, state, started_at) = {
            let inner = self.inner.lock();
            (
                inner.settings.clone(),
                inner.state,
                inner.process.as_ref().map(|p| p.started_at),
            )
        };

        let host = self.ctx.host.lock().sample();

        let scan_settings = settings.clone();
        let (world, problems) =
            tokio::task::spawn_blocking(move || status::scan_install(&scan_settings))
                .await
                .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        let ping = if running {
            self.ctx
                .pinger
                .ping(&settings.server_ip, settings.server_port)
                .await
                .ok()
        } else {
            None
        };
        let (server_description, server_version, online_stats) = status::live_fields(ping);

        let snapshot = StatusSnapshot {
            server_id: self.server_id,
            server_name: settings.name.clone(),
            server_running: running,
            state,
            mc_start_time: started_at.map(|t| t.format(constants::DB_TIME_FORMAT).to_string()),
            cpu_usage: host.cpu_usage,
            cpu_cores: host.cpu_cores,
            mem_percent: host.mem_percent,
            disk_percent: host.disk_percent,
            boot_time: host.boot_time,
            errors: problems.errors,
            warnings: problems.warnings,
            world_data: world,
            server_description,
            server_version,
            online_stats,
            pending_decision: self.decisions.pending(),
            updated_at: Utc::now().format(constants::DB_TIME_FORMAT).to_string(),
        };

        let path = constants::status_path(&self.ctx.config.status_dir, self.server_id);
        status::write_atomic(&path, &snapshot)?;
        debug!("Published status for server {} to {}", self.server_id, path.display());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, wait_until, write_runtime, MockPinger, IGNORING_RUNTIME};
    use nix::sys::signal::kill;
    use nix::unistd::Pid as NixPid;

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;

        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        let process = sup.process_state().unwrap();
        assert_ne!(process.pid, process.shell_pid);

        let err = sup.start().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: ServerState::Running,
                to: ServerState::Starting,
                ..
            }
        ));

        assert_eq!(sup.stop().await.unwrap(), StopOutcome::Stopped);
        assert_eq!(sup.state(), ServerState::Stopped);
        assert!(sup.process_state().is_none());
    }

    #[tokio::test]
    async fn test_check_running_clears_state_after_exit() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;
        sup.start().await.unwrap();
        assert!(sup.check_running());

        // The fake runtime exits on its own when told to stop
        sup.send_command("stop").unwrap();
        assert!(wait_until(Duration::from_secs(5), || !sup.check_running()).await);

        assert!(sup.process_state().is_none());
        assert_eq!(sup.state(), ServerState::Crashed);
        assert!(matches!(
            sup.send_command("list").unwrap_err(),
            Error::NotRunning(_)
        ));

        // stop() acknowledges the crash
        assert_eq!(sup.stop().await.unwrap(), StopOutcome::NotRunning);
        assert_eq!(sup.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_killed_process_is_detected() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;
        sup.start().await.unwrap();

        let pid = sup.process_state().unwrap().pid;
        kill(NixPid::from_raw(pid as i32), Signal::SIGKILL).unwrap();

        assert!(wait_until(Duration::from_secs(5), || !sup.check_running()).await);
        assert_eq!(sup.state(), ServerState::Crashed);

        // start() acknowledges the crash too
        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_proxy_install_stops_with_end() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("lobby").await;
        let path = sup.settings().server_path;
        std::fs::write(path.join("config.yml"), "listeners: []\n").unwrap();

        sup.start().await.unwrap();
        assert_eq!(sup.stop().await.unwrap(), StopOutcome::Stopped);

        let received = std::fs::read_to_string(path.join("console-input.txt")).unwrap();
        assert!(received.lines().any(|l| l.trim() == "end"));
        assert!(!received.lines().any(|l| l.trim() == "stop"));
    }

    #[tokio::test]
    async fn test_unresponsive_stop_raises_decision() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();

        let outcome = sup.stop().await.unwrap();
        let decision_id = match outcome {
            StopOutcome::Unresponsive { decision_id } => decision_id,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(sup.state(), ServerState::Stopping);
        assert_eq!(sup.pending_decision().unwrap().id, decision_id);

        // A second stop is refused while the decision is open
        assert!(matches!(
            sup.stop().await.unwrap_err(),
            Error::DecisionPending(_)
        ));

        // Decline leaves it running
        sup.resolve_decision(false).await.unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        assert!(sup.check_running());

        // Confirm kills it
        assert!(matches!(sup.stop().await.unwrap(), StopOutcome::Unresponsive { .. }));
        sup.resolve_decision(true).await.unwrap();
        assert_eq!(sup.state(), ServerState::Stopped);
        assert!(sup.process_state().is_none());
        assert!(sup.pending_decision().is_none());
    }

    async fn kill_after_unresponsive_stop(sup: &Supervisor) -> u32 {
        assert!(matches!(
            sup.stop().await.unwrap(),
            StopOutcome::Unresponsive { .. }
        ));
        let pid = sup.process_state().unwrap().pid;
        kill(NixPid::from_raw(pid as i32), Signal::SIGKILL).unwrap();
        pid
    }

    async fn force_stop(sup: &Supervisor) {
        assert!(matches!(
            sup.stop().await.unwrap(),
            StopOutcome::Unresponsive { .. }
        ));
        sup.resolve_decision(true).await.unwrap();
        assert_eq!(sup.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_late_exit_completes_stop() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();

        kill_after_unresponsive_stop(&sup).await;
        assert!(wait_until(Duration::from_secs(5), || !sup.check_running()).await);

        assert_eq!(sup.state(), ServerState::Stopped);
        assert!(sup.process_state().is_none());
        assert!(sup.pending_decision().is_none());

        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        force_stop(&sup).await;
    }

    #[tokio::test]
    async fn test_decline_after_late_exit_stops() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();

        let pid = kill_after_unresponsive_stop(&sup).await;
        assert!(wait_until(Duration::from_secs(5), || !pid_exists(pid)).await);

        sup.resolve_decision(false).await.unwrap();
        assert_eq!(sup.state(), ServerState::Stopped);
        assert!(sup.process_state().is_none());
        assert_eq!(sup.stop().await.unwrap(), StopOutcome::NotRunning);

        sup.start().await.unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        force_stop(&sup).await;
    }

    #[tokio::test]
    async fn test_unresponsive_stop_with_open_decision_rolls_back() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();

        sup.decisions()
            .raise(DecisionKind::KillOrphan {
                pid: 999_999,
                cmdline: "java -jar server.jar".to_string(),
            })
            .unwrap();

        assert!(matches!(
            sup.stop().await.unwrap_err(),
            Error::DecisionPending(_)
        ));
        assert_eq!(sup.state(), ServerState::Running);
        assert!(sup.check_running());

        sup.decisions().take();
        force_stop(&sup).await;
    }

    #[tokio::test]
    async fn test_resolve_expired_applies_policy() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();
        sup.stop().await.unwrap();

        let now = Utc::now();
        assert!(sup
            .resolve_expired(DecisionPolicy::AutoKill, now)
            .await
            .unwrap()
            .is_none());

        let later = now + chrono::Duration::seconds(3600);
        let resolved = sup
            .resolve_expired(DecisionPolicy::AutoKill, later)
            .await
            .unwrap();
        assert!(resolved.is_some());
        assert_eq!(sup.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_replaces_process() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;
        sup.start().await.unwrap();
        let before = sup.process_state().unwrap();

        assert_eq!(sup.restart().await.unwrap(), StopOutcome::Stopped);
        let after = sup.process_state().unwrap();
        assert_eq!(sup.state(), ServerState::Running);
        assert_ne!(before.shell_pid, after.shell_pid);

        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_skips_start_when_stop_hangs() {
        let fx = fixture(MockPinger::unreachable()).await;
        write_runtime(&fx.runtime_path(), IGNORING_RUNTIME);
        let sup = fx.add_server("stubborn").await;
        sup.start().await.unwrap();

        let outcome = sup.restart().await.unwrap();
        assert!(matches!(outcome, StopOutcome::Unresponsive { .. }));
        assert_eq!(sup.state(), ServerState::Stopping);

        sup.resolve_decision(true).await.unwrap();
        assert_eq!(sup.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_resolve_without_decision() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;
        assert!(matches!(
            sup.resolve_decision(true).await.unwrap_err(),
            Error::NoPendingDecision(_)
        ));
    }

    #[tokio::test]
    async fn test_start_fails_without_jar() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("broken").await;
        std::fs::remove_file(sup.settings().server_path.join("server.jar")).unwrap();

        assert!(matches!(
            sup.start().await.unwrap_err(),
            Error::ProcessStartFailed(_)
        ));
        assert_eq!(sup.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_reload_settings_recomputes_command() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;

        let mut settings = sup.settings();
        settings.memory_min = 512;
        settings.memory_max = 1024;
        settings.server_path = std::path::PathBuf::from("/srv/mc one");
        fx.db.servers().update(&settings).await.unwrap();

        sup.reload_settings().await.unwrap();
        let cmd = sup.launch_command();
        assert!(cmd.contains("-Xms512M -Xmx1024M"));
        assert!(cmd.contains("\"/srv/mc one\"/server.jar"));
    }

    #[tokio::test]
    async fn test_publish_status_when_stopped() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;

        let snapshot = sup.publish_status().await.unwrap();
        assert!(!snapshot.server_running);
        assert_eq!(snapshot.state, ServerState::Stopped);
        assert_eq!(snapshot.server_description, status::UNREACHABLE);

        let path = constants::status_path(&fx.config.status_dir, sup.id());
        let on_disk: StatusSnapshot =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(on_disk.server_id, sup.id());
    }

    #[tokio::test]
    async fn test_publish_status_uses_ping_when_running() {
        let fx = fixture(MockPinger::online(3, 20)).await;
        let sup = fx.add_server("survival").await;
        sup.start().await.unwrap();

        let snapshot = sup.publish_status().await.unwrap();
        assert!(snapshot.server_running);
        assert!(snapshot.mc_start_time.is_some());
        assert_eq!(snapshot.online_stats.online, 3);
        assert_eq!(snapshot.online_stats.max, 20);
        assert_eq!(snapshot.server_version, "1.20.4");

        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_orphan_blocks_start_until_resolved() {
        let fx = fixture(MockPinger::unreachable()).await;
        let sup = fx.add_server("survival").await;

        let mut settings = sup.settings();
        settings.server_jar = "orphan-check.jar".to_string();
        std::fs::write(settings.server_path.join("orphan-check.jar"), b"").unwrap();
        fx.db.servers().update(&settings).await.unwrap();
        sup.reload_settings().await.unwrap();

        // Detached runtime: the intermediate shell exits, so the process
        // is not a descendant of this one
        let stray = fx.dir.path().join("stray").join("java");
        write_runtime(&stray, IGNORING_RUNTIME);
        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!(
                "'{}' -jar orphan-check.jar </dev/null >/dev/null 2>&1 &",
                stray.display()
            ))
            .status()
            .unwrap();
        assert!(status.success());

        let mut seen = 0;
        for _ in 0..50 {
            seen = sup.check_orphaned_server().unwrap();
            if seen > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(seen, 1);
        assert!(sup.decisions().has_orphan());
        assert!(matches!(
            sup.start().await.unwrap_err(),
            Error::DecisionPending(_)
        ));

        let resolved = sup.resolve_decision(true).await.unwrap();
        assert!(matches!(resolved.kind, DecisionKind::KillOrphan { .. }));
        assert!(sup.pending_decision().is_none());
    }
}
