//! Daemon configuration file parsing for mcpanel
//!
//! The daemon reads `~/.mcpanel/mcpanel.toml`. Every field is optional;
//! a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{self, *};
use crate::error::{Error, Result};

/// What happens to a pending decision nobody answered before its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPolicy {
    /// Confirm: kill the unresponsive or orphaned process
    AutoKill,
    /// Decline: leave the process running and log a warning
    #[default]
    AutoDecline,
}

impl DecisionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPolicy::AutoKill => "auto_kill",
            DecisionPolicy::AutoDecline => "auto_decline",
        }
    }
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub db_path: PathBuf,
    pub status_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub runtime: RuntimeConfig,
    pub supervisor: SupervisorConfig,
    pub decisions: DecisionConfig,
    pub dispatcher: DispatcherConfig,
    pub ping: PingConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            db_path: constants::db_path(),
            status_dir: constants::status_dir(),
            logs_dir: constants::logs_dir(),
            runtime: RuntimeConfig::default(),
            supervisor: SupervisorConfig::default(),
            decisions: DecisionConfig::default(),
            dispatcher: DispatcherConfig::default(),
            ping: PingConfig::default(),
        }
    }
}

/// How the game runtime is launched and recognised
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Binary written at the head of the launch line
    pub binary: String,
    /// Name matched against host processes for pid resolution and orphan scans
    pub process_name: String,
    /// Shell spawned behind the pseudo-terminal
    pub shell: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_RUNTIME_BINARY.to_string(),
            process_name: DEFAULT_RUNTIME_PROCESS_NAME.to_string(),
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

/// Supervisor timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub stop_poll_interval_ms: u64,
    pub stop_poll_attempts: u32,
    pub restart_settle_ms: u64,
    pub pid_resolve_timeout_ms: u64,
    pub status_interval_secs: u64,
    pub watchdog_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_poll_interval_ms: DEFAULT_STOP_POLL_INTERVAL_MS,
            stop_poll_attempts: DEFAULT_STOP_POLL_ATTEMPTS,
            restart_settle_ms: DEFAULT_RESTART_SETTLE_MS,
            pid_resolve_timeout_ms: DEFAULT_PID_RESOLVE_TIMEOUT_MS,
            status_interval_secs: DEFAULT_STATUS_INTERVAL_SECS,
            watchdog_interval_secs: DEFAULT_WATCHDOG_INTERVAL_SECS,
        }
    }
}

impl SupervisorConfig {
    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn pid_resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.pid_resolve_timeout_ms)
    }
}

/// Auto-policy for decisions nobody answered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub policy: DecisionPolicy,
    pub timeout_secs: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            policy: DecisionPolicy::default(),
            timeout_secs: DEFAULT_DECISION_TIMEOUT_SECS,
        }
    }
}

/// Mailbox polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the ping to go quiet during restart
    pub ping_settle_timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_DISPATCH_INTERVAL_MS,
            ping_settle_timeout_secs: DEFAULT_PING_SETTLE_TIMEOUT_SECS,
        }
    }
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ping_settle_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_settle_timeout_secs)
    }
}

/// Ping capability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    pub timeout_ms: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_PING_TIMEOUT_MS,
        }
    }
}

impl PanelConfig {
    /// Load config from the default path, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let path = constants::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML config content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PanelConfig = toml::from_str(content)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.supervisor.stop_poll_attempts == 0 {
            return Err(Error::config("supervisor.stop_poll_attempts must be at least 1"));
        }
        if self.dispatcher.poll_interval_ms == 0 {
            return Err(Error::config("dispatcher.poll_interval_ms must be positive"));
        }
        if self.runtime.process_name.trim().is_empty() {
            return Err(Error::config("runtime.process_name is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.runtime.binary, "java");
        assert_eq!(config.supervisor.stop_poll_attempts, 6);
        assert_eq!(config.decisions.policy, DecisionPolicy::AutoDecline);
        assert_eq!(config.dispatcher.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_partial_toml() {
        let content = r#"
status_dir = "/var/lib/mcpanel/web"

[decisions]
policy = "auto_kill"
timeout_secs = 30

[supervisor]
stop_poll_attempts = 3
"#;
        let config = PanelConfig::from_toml(content).unwrap();
        assert_eq!(config.status_dir, PathBuf::from("/var/lib/mcpanel/web"));
        assert_eq!(config.decisions.policy, DecisionPolicy::AutoKill);
        assert_eq!(config.decisions.timeout_secs, 30);
        assert_eq!(config.supervisor.stop_poll_attempts, 3);
        assert_eq!(config.supervisor.stop_poll_interval_ms, DEFAULT_STOP_POLL_INTERVAL_MS);
        assert_eq!(config.runtime.process_name, "java");
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcpanel.toml");
        std::fs::write(&path, "[supervisor]\nstop_poll_attempts = 0\n").unwrap();

        let result = PanelConfig::load_from(&path);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_not_found() {
        let result = PanelConfig::load_from(Path::new("/nonexistent/mcpanel.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let result = PanelConfig::from_toml("[decisions]\npolicy = \"ask_nicely\"\n");
        assert!(matches!(result, Err(Error::TomlError(_))));
    }
}
