//! Constants and default values for mcpanel

use std::path::PathBuf;

/// Default mcpanel home directory name
pub const MCPANEL_DIR: &str = ".mcpanel";

/// Default daemon config file name
pub const CONFIG_FILE: &str = "mcpanel.toml";

/// Default database file name
pub const DB_FILE: &str = "mcpanel.db";

/// Default directory for published status artifacts
pub const STATUS_DIR: &str = "web_temp";

/// Default log directory name
pub const LOGS_DIR: &str = "logs";

/// Default backup storage directory name
pub const BACKUPS_DIR: &str = "backups";

/// Runtime binary used in the launch line
pub const DEFAULT_RUNTIME_BINARY: &str = "java";

/// Process name matched when resolving the game pid and scanning for orphans
pub const DEFAULT_RUNTIME_PROCESS_NAME: &str = "java";

/// Shell spawned behind the pseudo-terminal
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Graceful shutdown keyword for standard servers
pub const STOP_KEYWORD: &str = "stop";

/// Graceful shutdown keyword for proxy-style installs
pub const PROXY_STOP_KEYWORD: &str = "end";

/// File whose presence in the install dir marks a proxy-style install
pub const PROXY_FLAVOR_MARKER: &str = "config.yml";

/// Server properties file inside the install dir
pub const SERVER_PROPERTIES: &str = "server.properties";

/// Directory name holding world chunk data
pub const REGION_DIR: &str = "region";

/// Prefix for in-game announcements
pub const ANNOUNCE_PREFIX: &str = "say [mcpanel]";

/// Default mailbox polling interval in milliseconds
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 1000;

/// Default status publish interval in seconds
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 30;

/// Default crash watchdog interval in seconds
pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 10;

/// Default liveness poll interval during stop in milliseconds
pub const DEFAULT_STOP_POLL_INTERVAL_MS: u64 = 10_000;

/// Default number of liveness polls during stop
pub const DEFAULT_STOP_POLL_ATTEMPTS: u32 = 6;

/// Default delay between stop and start on restart in milliseconds
pub const DEFAULT_RESTART_SETTLE_MS: u64 = 3000;

/// Default deadline for a pending decision in seconds
pub const DEFAULT_DECISION_TIMEOUT_SECS: u64 = 120;

/// Default ping timeout in milliseconds
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 3000;

/// Default bound on waiting for the ping to go quiet after stop, in seconds
pub const DEFAULT_PING_SETTLE_TIMEOUT_SECS: u64 = 60;

/// How long start() waits for the runtime process to appear under the shell
pub const DEFAULT_PID_RESOLVE_TIMEOUT_MS: u64 = 3000;

/// Default history sampling interval in minutes
pub const DEFAULT_HISTORY_INTERVAL_MINS: u32 = 60;

/// Default history retention in days
pub const DEFAULT_HISTORY_MAX_AGE_DAYS: u32 = 2;

/// Default backup retention in days
pub const DEFAULT_BACKUP_MAX_AGE_DAYS: u32 = 7;

/// Number of trailing log lines scanned for errors and warnings
pub const LOG_SCAN_LINES: usize = 1000;

/// Default console log max size in bytes (10MB)
pub const DEFAULT_LOG_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default max console log files to keep
pub const DEFAULT_LOG_MAX_FILES: usize = 5;

/// Timestamp format used for stored rows
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used for backup archive names
pub const BACKUP_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Get the mcpanel home directory
pub fn mcpanel_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(MCPANEL_DIR))
        .unwrap_or_else(|| PathBuf::from(MCPANEL_DIR))
}

/// Get the daemon config path
pub fn config_path() -> PathBuf {
    mcpanel_home().join(CONFIG_FILE)
}

/// Get the database path
pub fn db_path() -> PathBuf {
    mcpanel_home().join(DB_FILE)
}

/// Get the status artifact directory
pub fn status_dir() -> PathBuf {
    mcpanel_home().join(STATUS_DIR)
}

/// Get the logs directory
pub fn logs_dir() -> PathBuf {
    mcpanel_home().join(LOGS_DIR)
}

/// Get the default backup storage root
pub fn backups_dir() -> PathBuf {
    mcpanel_home().join(BACKUPS_DIR)
}

/// Get the status artifact path for a server
pub fn status_path(dir: &std::path::Path, server_id: u32) -> PathBuf {
    dir.join(format!("server_{}.json", server_id))
}

/// Get the console capture path for a server
pub fn console_log_path(dir: &std::path::Path, server_id: u32) -> PathBuf {
    dir.join(format!("server-{}-console.log", server_id))
}
