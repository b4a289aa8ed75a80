//! Shared fixtures for daemon tests

use async_trait::async_trait;
use mcpanel_core::{Error, PanelConfig, Result, ServerSettings};
use mcpanel_db::Database;
use mcpanel_ping::{PingStatus, Pinger};
use mcpanel_runtime::HostSampler;
use parking_lot::Mutex;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::registry::ServerRegistry;
use crate::supervisor::{Supervisor, SupervisorContext};

/// Records console input and exits on the shutdown keyword
pub const RESPONSIVE_RUNTIME: &str = r#"#!/bin/sh
while read -r line; do
  echo "$line" >> "$PWD/console-input.txt"
  case "$line" in
    stop|end) exit 0 ;;
  esac
done
"#;

/// Records console input but never exits on its own
pub const IGNORING_RUNTIME: &str = r#"#!/bin/sh
while :; do
  if read -r line; then
    echo "$line" >> "$PWD/console-input.txt"
  else
    sleep 1
  fi
done
"#;

pub struct MockPinger {
    status: Option<PingStatus>,
    calls: AtomicUsize,
}

impl MockPinger {
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            status: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn online(online: u32, max: u32) -> Arc<Self> {
        Arc::new(Self {
            status: Some(PingStatus {
                description: "A Minecraft Server".to_string(),
                version: "1.20.4".to_string(),
                online,
                max,
                players: (0..online).map(|i| format!("player{}", i)).collect(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for MockPinger {
    async fn ping(&self, host: &str, port: u16) -> Result<PingStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status
            .clone()
            .ok_or_else(|| Error::ping(format!("{}:{}: connection refused", host, port)))
    }
}

pub fn write_runtime(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Create an install dir with an (empty) server jar under `root`
pub fn install_server(root: &Path, name: &str) -> ServerSettings {
    let path = root.join("servers").join(name);
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("server.jar"), b"").unwrap();
    ServerSettings::new(name, path, "server.jar").with_memory(64, 128)
}

pub async fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub db: Database,
    pub config: Arc<PanelConfig>,
    pub pinger: Arc<MockPinger>,
    pub ctx: SupervisorContext,
    pub registry: Arc<ServerRegistry>,
}

impl Fixture {
    pub fn runtime_path(&self) -> PathBuf {
        self.dir.path().join("bin").join("java")
    }

    /// Install, persist and register a server
    pub async fn add_server(&self, name: &str) -> Arc<Supervisor> {
        let mut settings = install_server(self.dir.path(), name);
        settings.id = self.db.servers().insert(&settings).await.unwrap();
        self.registry.insert(settings)
    }
}

pub async fn fixture(pinger: Arc<MockPinger>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let runtime = root.join("bin").join("java");
    write_runtime(&runtime, RESPONSIVE_RUNTIME);

    let mut config = PanelConfig {
        db_path: root.join("mcpanel.db"),
        status_dir: root.join("web_temp"),
        logs_dir: root.join("logs"),
        ..PanelConfig::default()
    };
    config.runtime.binary = runtime.display().to_string();
    config.runtime.shell = "/bin/bash".to_string();
    config.supervisor.stop_poll_interval_ms = 50;
    config.supervisor.stop_poll_attempts = 40;
    config.supervisor.restart_settle_ms = 10;
    config.supervisor.pid_resolve_timeout_ms = 3000;
    config.decisions.timeout_secs = 60;
    config.dispatcher.poll_interval_ms = 50;
    config.dispatcher.ping_settle_timeout_secs = 2;
    let config = Arc::new(config);

    let db = Database::new(&config.db_path).await.unwrap();
    let ctx = SupervisorContext {
        db: db.clone(),
        config: Arc::clone(&config),
        pinger: pinger.clone(),
        host: Arc::new(Mutex::new(HostSampler::new())),
    };
    let registry = Arc::new(ServerRegistry::new(ctx.clone()));

    Fixture {
        dir,
        db,
        config,
        pinger,
        ctx,
        registry,
    }
}
