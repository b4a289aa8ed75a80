//! Crash watchdog and boot-time autostart

use mcpanel_core::{ServerSettings, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::registry::ServerRegistry;

/// Probe every server; restart crashed ones that have crash detection on.
///
/// Returns the ids that were started again.
pub async fn check_crashes(registry: &ServerRegistry) -> Vec<u32> {
    let mut restarted = Vec::new();

    for supervisor in registry.all() {
        if supervisor.check_running() || supervisor.state() != ServerState::Crashed {
            continue;
        }
        if !supervisor.settings().crash_detection {
            debug!("Server {} crashed, crash detection is off", supervisor.id());
            continue;
        }

        warn!("Server {} crashed, starting it again", supervisor.id());
        match supervisor.start().await {
            Ok(()) => restarted.push(supervisor.id()),
            Err(e) => error!("Failed to restart crashed server {}: {}", supervisor.id(), e),
        }
    }

    restarted
}

pub async fn run_watchdog(
    registry: Arc<ServerRegistry>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("Watchdog stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                check_crashes(&registry).await;
            }
        }
    }
}

/// Autostart candidates, lowest priority value first
pub fn autostart_order(servers: &[ServerSettings]) -> Vec<&ServerSettings> {
    let mut order: Vec<_> = servers.iter().filter(|s| s.auto_start).collect();
    order.sort_by_key(|s| (s.auto_start_priority, s.id));
    order
}

/// Start every autostart server in priority order, each after its delay
pub async fn autostart(registry: Arc<ServerRegistry>) {
    let settings: Vec<ServerSettings> = registry.all().iter().map(|s| s.settings()).collect();

    for server in autostart_order(&settings) {
        if server.auto_start_delay > 0 {
            info!(
                "Autostarting server {} in {} seconds",
                server.name, server.auto_start_delay
            );
            tokio::time::sleep(Duration::from_secs(server.auto_start_delay)).await;
        }

        let supervisor = match registry.get(server.id) {
            Ok(supervisor) => supervisor,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        if supervisor.check_running() {
            continue;
        }
        match supervisor.start().await {
            Ok(()) => info!("Autostarted server {}", server.name),
            Err(e) => error!("Autostart of server {} failed: {}", server.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, wait_until, MockPinger};
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    #[test]
    fn test_autostart_order() {
        let mut servers = Vec::new();
        for (id, priority, enabled) in [(1, 5, true), (2, 1, true), (3, 0, false), (4, 1, true)] {
            let mut s = ServerSettings::new(format!("s{}", id), "/srv", "server.jar");
            s.id = id;
            s.auto_start = enabled;
            s.auto_start_priority = priority;
            servers.push(s);
        }

        let ids: Vec<u32> = autostart_order(&servers).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[tokio::test]
    async fn test_autostart_starts_enabled_servers() {
        let fx = fixture(MockPinger::unreachable()).await;
        let on = fx.add_server("on").await;
        let off = fx.add_server("off").await;

        let settings = on.settings().with_auto_start(0, 1);
        fx.db.servers().update(&settings).await.unwrap();
        on.apply_settings(settings);

        autostart(fx.registry.clone()).await;
        assert_eq!(on.state(), ServerState::Running);
        assert_eq!(off.state(), ServerState::Stopped);
        on.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_crashed_server_is_restarted() {
        let fx = fixture(MockPinger::unreachable()).await;
        let watched = fx.add_server("watched").await;
        let unwatched = fx.add_server("unwatched").await;

        let mut settings = watched.settings();
        settings.crash_detection = true;
        watched.apply_settings(settings);

        watched.start().await.unwrap();
        unwatched.start().await.unwrap();
        for sup in [&watched, &unwatched] {
            let pid = sup.process_state().unwrap().pid;
            kill(Pid::from_raw(pid as i32), Signal::SIGKILL).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || {
            !watched.check_running() && !unwatched.check_running()
        })
        .await);

        let restarted = check_crashes(&fx.registry).await;
        assert_eq!(restarted, vec![watched.id()]);
        assert_eq!(watched.state(), ServerState::Running);
        assert_eq!(unwatched.state(), ServerState::Crashed);

        watched.stop().await.unwrap();
    }
}
