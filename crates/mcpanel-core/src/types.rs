//! Core types for mcpanel

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern for valid server names: alphanumeric, underscore, hyphen and spaces
static SERVER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_ -]+$").expect("Invalid server name regex"));

/// Validate a server display name
pub fn validate_server_name(name: &str) -> bool {
    !name.trim().is_empty() && SERVER_NAME_REGEX.is_match(name)
}

/// Persisted configuration of one managed server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub id: u32,
    pub name: String,
    pub server_path: PathBuf,
    pub server_jar: String,
    /// Minimum heap in megabytes
    pub memory_min: u32,
    /// Maximum heap in megabytes
    pub memory_max: u32,
    /// Arguments placed after `nogui`
    #[serde(default)]
    pub additional_args: String,
    /// Arguments placed before `-jar`
    #[serde(default)]
    pub pre_args: String,
    #[serde(default)]
    pub auto_start: bool,
    /// Seconds to wait before an automatic start
    #[serde(default)]
    pub auto_start_delay: u64,
    /// Lower values start first
    #[serde(default)]
    pub auto_start_priority: i32,
    pub server_ip: String,
    pub server_port: u16,
    #[serde(default)]
    pub crash_detection: bool,
}

impl ServerSettings {
    pub fn new(name: impl Into<String>, server_path: impl Into<PathBuf>, server_jar: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            server_path: server_path.into(),
            server_jar: server_jar.into(),
            memory_min: 1024,
            memory_max: 2048,
            additional_args: String::new(),
            pre_args: String::new(),
            auto_start: false,
            auto_start_delay: 10,
            auto_start_priority: 0,
            server_ip: "127.0.0.1".to_string(),
            server_port: 25565,
            crash_detection: false,
        }
    }

    pub fn with_memory(mut self, min: u32, max: u32) -> Self {
        self.memory_min = min;
        self.memory_max = max;
        self
    }

    pub fn with_args(mut self, pre_args: impl Into<String>, additional_args: impl Into<String>) -> Self {
        self.pre_args = pre_args.into();
        self.additional_args = additional_args.into();
        self
    }

    pub fn with_address(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.server_ip = ip.into();
        self.server_port = port;
        self
    }

    pub fn with_auto_start(mut self, delay_secs: u64, priority: i32) -> Self {
        self.auto_start = true;
        self.auto_start_delay = delay_secs;
        self.auto_start_priority = priority;
        self
    }

    /// Check the settings are usable for building a launch command
    pub fn validate(&self) -> Result<()> {
        if !validate_server_name(&self.name) {
            return Err(Error::settings(format!("Invalid server name '{}'", self.name)));
        }
        if self.server_jar.trim().is_empty() {
            return Err(Error::settings("Server jar is empty"));
        }
        if self.memory_min > self.memory_max {
            return Err(Error::settings(format!(
                "Minimum memory {}M exceeds maximum {}M",
                self.memory_min, self.memory_max
            )));
        }
        Ok(())
    }

    /// A proxy-style install carries a flavor marker file in its install dir
    pub fn is_proxy_flavor(&self) -> bool {
        self.server_path.join(PROXY_FLAVOR_MARKER).is_file()
    }

    pub fn latest_log_path(&self) -> PathBuf {
        self.server_path.join("logs").join("latest.log")
    }
}

/// Lifecycle state of a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Crashed => "crashed",
        }
    }

    /// Whether a process may be alive in this state
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServerState::Starting | ServerState::Running | ServerState::Stopping
        )
    }

    /// Guarded transitions of the lifecycle state machine
    pub fn can_transition_to(&self, next: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Crashed, Starting)
                | (Crashed, Stopped)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Crashed)
                | (Stopping, Stopped)
                | (Stopping, Running)
        )
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory record of a launched server process, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeProcessState {
    /// Resolved game process id (falls back to the shell pid)
    pub pid: u32,
    /// Pid of the host shell that owns the pseudo-terminal
    pub shell_pid: u32,
    pub started_at: DateTime<Utc>,
    pub launch_command: String,
}

/// Privileged actions accepted through the command slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    StartServer,
    StopServer,
    RestartServer,
    StartFtp,
    StopFtp,
    BackupServer,
    BackupAll,
    ReloadSettings,
    ReloadSchedules,
    ConfirmDecision,
    DeclineDecision,
    ExitPanel,
}

impl CommandKind {
    pub const ALL: [CommandKind; 12] = [
        CommandKind::StartServer,
        CommandKind::StopServer,
        CommandKind::RestartServer,
        CommandKind::StartFtp,
        CommandKind::StopFtp,
        CommandKind::BackupServer,
        CommandKind::BackupAll,
        CommandKind::ReloadSettings,
        CommandKind::ReloadSchedules,
        CommandKind::ConfirmDecision,
        CommandKind::DeclineDecision,
        CommandKind::ExitPanel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::StartServer => "start_server",
            CommandKind::StopServer => "stop_server",
            CommandKind::RestartServer => "restart_server",
            CommandKind::StartFtp => "start_ftp",
            CommandKind::StopFtp => "stop_ftp",
            CommandKind::BackupServer => "backup_server",
            CommandKind::BackupAll => "backup_all",
            CommandKind::ReloadSettings => "reload_settings",
            CommandKind::ReloadSchedules => "reload_schedules",
            CommandKind::ConfirmDecision => "confirm_decision",
            CommandKind::DeclineDecision => "decline_decision",
            CommandKind::ExitPanel => "exit_panel",
        }
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CommandKind::ALL
            .iter()
            .find(|k| k.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| Error::InvalidCommand(s.to_string()))
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the single-slot command mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub kind: CommandKind,
    pub server_id: u32,
    pub source: String,
}

impl RemoteCommand {
    pub fn new(kind: CommandKind, server_id: u32, source: impl Into<String>) -> Self {
        Self {
            kind,
            server_id,
            source: source.into(),
        }
    }
}

/// What a user schedule does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAction {
    Start,
    Stop,
    Restart,
    Backup,
    Command,
}

impl ScheduleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleAction::Start => "start",
            ScheduleAction::Stop => "stop",
            ScheduleAction::Restart => "restart",
            ScheduleAction::Backup => "backup",
            ScheduleAction::Command => "command",
        }
    }
}

impl FromStr for ScheduleAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(ScheduleAction::Start),
            "stop" => Ok(ScheduleAction::Stop),
            "restart" => Ok(ScheduleAction::Restart),
            "backup" => Ok(ScheduleAction::Backup),
            "command" => Ok(ScheduleAction::Command),
            _ => Err(Error::InvalidSchedule(format!("unknown action '{}'", s))),
        }
    }
}

/// Unit of a schedule interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weekday(Weekday),
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Seconds => "seconds",
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
            IntervalUnit::Weekday(Weekday::Mon) => "monday",
            IntervalUnit::Weekday(Weekday::Tue) => "tuesday",
            IntervalUnit::Weekday(Weekday::Wed) => "wednesday",
            IntervalUnit::Weekday(Weekday::Thu) => "thursday",
            IntervalUnit::Weekday(Weekday::Fri) => "friday",
            IntervalUnit::Weekday(Weekday::Sat) => "saturday",
            IntervalUnit::Weekday(Weekday::Sun) => "sunday",
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "second" | "seconds" => Ok(IntervalUnit::Seconds),
            "minute" | "minutes" => Ok(IntervalUnit::Minutes),
            "hour" | "hours" => Ok(IntervalUnit::Hours),
            "day" | "days" => Ok(IntervalUnit::Days),
            other => other
                .parse::<Weekday>()
                .map(IntervalUnit::Weekday)
                .map_err(|_| Error::InvalidSchedule(format!("unknown interval unit '{}'", s))),
        }
    }
}

/// An admin-defined schedule row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: u32,
    pub server_id: u32,
    pub enabled: bool,
    pub action: String,
    pub interval: u32,
    pub interval_type: String,
    /// `HH:MM`, anchors day and weekday schedules
    pub start_time: Option<String>,
    /// Console text for `command` schedules
    pub command: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl ScheduleDefinition {
    pub fn action(&self) -> Result<ScheduleAction> {
        self.action.parse()
    }

    pub fn unit(&self) -> Result<IntervalUnit> {
        self.interval_type.parse()
    }

    pub fn start_time(&self) -> Result<Option<NaiveTime>> {
        match self.start_time.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(t) => NaiveTime::parse_from_str(t, "%H:%M")
                .map(Some)
                .map_err(|_| Error::InvalidSchedule(format!("bad start time '{}'", t))),
        }
    }

    /// Reject rows the scheduler could never run
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(Error::InvalidSchedule("interval must be at least 1".into()));
        }
        self.unit()?;
        self.start_time()?;
        if self.action()? == ScheduleAction::Command
            && self.command.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            return Err(Error::InvalidSchedule(
                "command schedules need console text".into(),
            ));
        }
        Ok(())
    }
}

/// Backup configuration for one server, read fresh on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub server_id: u32,
    pub directories: Vec<PathBuf>,
    pub storage_location: PathBuf,
    /// Archives older than this many days are deleted
    pub max_backups: u32,
}

impl BackupConfig {
    /// Per-server flat archive directory under the storage root
    pub fn server_dir(&self) -> PathBuf {
        self.storage_location.join(self.server_id.to_string())
    }

    /// Archives in the server's backup directory, oldest name first.
    /// Symlinks are skipped; a missing directory lists as empty.
    pub fn list_archives(&self) -> Result<Vec<BackupEntry>> {
        let dir = self.server_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if !file_type.is_file() {
                continue;
            }
            let bytes = entry.metadata()?.len();
            entries.push(BackupEntry {
                path: entry.path(),
                bytes,
                size: human_readable_size(bytes),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// One archive on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub bytes: u64,
    /// Human readable size
    pub size: String,
}

/// Panel-wide settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Minutes between history samples
    pub history_interval: u32,
    /// Days of history kept
    pub history_max_age: u32,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            history_interval: DEFAULT_HISTORY_INTERVAL_MINS,
            history_max_age: DEFAULT_HISTORY_MAX_AGE_DAYS,
        }
    }
}

/// One resource/player sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub server_id: u32,
    pub time: DateTime<Utc>,
    pub cpu: f64,
    pub memory: f64,
    pub players: u32,
}

/// What an operator is being asked to decide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionKind {
    /// The server ignored its shutdown keyword
    ForceKill { pid: u32 },
    /// An untracked process is running the configured jar
    KillOrphan { pid: u32, cmdline: String },
}

impl DecisionKind {
    pub fn pid(&self) -> u32 {
        match self {
            DecisionKind::ForceKill { pid } | DecisionKind::KillOrphan { pid, .. } => *pid,
        }
    }
}

/// Decision point recorded instead of a blocking prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub id: u64,
    pub server_id: u32,
    pub kind: DecisionKind,
    pub raised_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl PendingDecision {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// World name and on-disk size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldInfo {
    pub world_name: String,
    pub world_size: String,
}

/// Live player counts reported by the ping capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OnlineStats {
    pub online: u32,
    pub max: u32,
    pub players: Vec<String>,
}

/// Flat status document consumed by the web layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub server_id: u32,
    pub server_name: String,
    pub server_running: bool,
    pub state: ServerState,
    pub mc_start_time: Option<String>,
    pub cpu_usage: f64,
    pub cpu_cores: usize,
    pub mem_percent: f64,
    pub disk_percent: f64,
    pub boot_time: String,
    pub errors: usize,
    pub warnings: usize,
    pub world_data: WorldInfo,
    pub server_description: String,
    pub server_version: String,
    pub online_stats: OnlineStats,
    pub pending_decision: Option<PendingDecision>,
    pub updated_at: String,
}

/// Format a byte count with binary unit suffixes
pub fn human_readable_size(bytes: u64) -> String {
    let mut num = bytes as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if num.abs() < 1024.0 {
            return format!("{:.1} {}B", num, unit);
        }
        num /= 1024.0;
    }
    format!("{:.1} YiB", num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(ServerState::Stopped.can_transition_to(ServerState::Starting));
        assert!(ServerState::Running.can_transition_to(ServerState::Crashed));
        assert!(ServerState::Crashed.can_transition_to(ServerState::Stopped));
        assert!(ServerState::Stopping.can_transition_to(ServerState::Running));
        assert!(!ServerState::Starting.can_transition_to(ServerState::Starting));
        assert!(!ServerState::Running.can_transition_to(ServerState::Starting));
        assert!(!ServerState::Stopped.can_transition_to(ServerState::Stopping));
    }

    #[test]
    fn test_state_is_active() {
        assert!(ServerState::Running.is_active());
        assert!(ServerState::Stopping.is_active());
        assert!(!ServerState::Crashed.is_active());
        assert!(!ServerState::Stopped.is_active());
    }

    #[test]
    fn test_command_kind_roundtrip_names() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.as_str().parse::<CommandKind>().unwrap(), kind);
        }
        assert!("launch_rockets".parse::<CommandKind>().is_err());
    }

    #[test]
    fn test_command_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&CommandKind::RestartServer).unwrap();
        assert_eq!(json, "\"restart_server\"");
    }

    #[test]
    fn test_interval_unit_parse() {
        assert_eq!("minutes".parse::<IntervalUnit>().unwrap(), IntervalUnit::Minutes);
        assert_eq!("Hours".parse::<IntervalUnit>().unwrap(), IntervalUnit::Hours);
        assert_eq!(
            "monday".parse::<IntervalUnit>().unwrap(),
            IntervalUnit::Weekday(Weekday::Mon)
        );
        assert!("fortnights".parse::<IntervalUnit>().is_err());
    }

    #[test]
    fn test_schedule_start_time() {
        let mut def = ScheduleDefinition {
            id: 1,
            server_id: 1,
            enabled: true,
            action: "backup".to_string(),
            interval: 1,
            interval_type: "days".to_string(),
            start_time: Some("04:30".to_string()),
            command: None,
            comment: String::new(),
        };
        assert_eq!(
            def.start_time().unwrap(),
            Some(NaiveTime::from_hms_opt(4, 30, 0).unwrap())
        );
        def.start_time = Some("".to_string());
        assert_eq!(def.start_time().unwrap(), None);
        def.start_time = Some("25:99".to_string());
        assert!(def.start_time().is_err());
    }

    #[test]
    fn test_schedule_validate() {
        let mut def = ScheduleDefinition {
            id: 0,
            server_id: 1,
            enabled: true,
            action: "command".to_string(),
            interval: 2,
            interval_type: "friday".to_string(),
            start_time: Some("18:00".to_string()),
            command: Some("save-all".to_string()),
            comment: String::new(),
        };
        assert!(def.validate().is_ok());

        def.command = Some("  ".to_string());
        assert!(def.validate().is_err());
        def.command = Some("save-all".to_string());

        def.interval = 0;
        assert!(def.validate().is_err());
        def.interval = 2;

        def.interval_type = "fortnights".to_string();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_settings_validate() {
        let settings = ServerSettings::new("survival", "/srv/mc", "server.jar").with_memory(512, 1024);
        assert!(settings.validate().is_ok());

        let bad = settings.clone().with_memory(2048, 1024);
        assert!(bad.validate().is_err());

        let mut unnamed = settings;
        unnamed.name = "../etc".to_string();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_proxy_flavor_detection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings::new("proxy", dir.path(), "waterfall.jar");
        assert!(!settings.is_proxy_flavor());

        std::fs::write(dir.path().join("config.yml"), "listeners: []").unwrap();
        assert!(settings.is_proxy_flavor());
    }

    #[test]
    fn test_decision_expiry() {
        let now = Utc::now();
        let decision = PendingDecision {
            id: 1,
            server_id: 1,
            kind: DecisionKind::ForceKill { pid: 42 },
            raised_at: now,
            deadline: now + chrono::Duration::seconds(5),
        };
        assert!(!decision.is_expired(now));
        assert!(decision.is_expired(now + chrono::Duration::seconds(5)));
        assert_eq!(decision.kind.pid(), 42);
    }

    #[test]
    fn test_human_readable_size() {
        assert_eq!(human_readable_size(512), "512.0 B");
        assert_eq!(human_readable_size(2048), "2.0 KiB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_backup_server_dir() {
        let cfg = BackupConfig {
            server_id: 3,
            directories: vec![PathBuf::from("/srv/mc")],
            storage_location: PathBuf::from("/var/backups"),
            max_backups: 7,
        };
        assert_eq!(cfg.server_dir(), PathBuf::from("/var/backups/3"));
    }

    #[test]
    fn test_list_archives() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BackupConfig {
            server_id: 1,
            directories: vec![],
            storage_location: dir.path().to_path_buf(),
            max_backups: 7,
        };
        assert!(cfg.list_archives().unwrap().is_empty());

        std::fs::create_dir_all(cfg.server_dir()).unwrap();
        std::fs::write(cfg.server_dir().join("2024-01-02_00-00-00.tar.gz"), vec![0u8; 2048]).unwrap();
        std::fs::write(cfg.server_dir().join("2024-01-01_00-00-00.tar.gz"), b"x").unwrap();

        let archives = cfg.list_archives().unwrap();
        assert_eq!(archives.len(), 2);
        assert!(archives[0].path.ends_with("2024-01-01_00-00-00.tar.gz"));
        assert_eq!(archives[1].size, "2.0 KiB");
    }
}
