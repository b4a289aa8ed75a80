//! Database schema for mcpanel

/// SQLite schema initialization
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS servers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    server_path TEXT NOT NULL,
    server_jar TEXT NOT NULL,
    memory_min INTEGER NOT NULL DEFAULT 1024,
    memory_max INTEGER NOT NULL DEFAULT 2048,
    additional_args TEXT NOT NULL DEFAULT '',
    pre_args TEXT NOT NULL DEFAULT '',
    auto_start INTEGER NOT NULL DEFAULT 0,
    auto_start_delay INTEGER NOT NULL DEFAULT 10,
    auto_start_priority INTEGER NOT NULL DEFAULT 0,
    server_ip TEXT NOT NULL DEFAULT '127.0.0.1',
    server_port INTEGER NOT NULL DEFAULT 25565,
    crash_detection INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS remote_commands (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    command TEXT NOT NULL,
    server_id INTEGER NOT NULL,
    command_source TEXT NOT NULL,
    submitted_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS schedules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id INTEGER NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    action TEXT NOT NULL,
    interval INTEGER NOT NULL,
    interval_type TEXT NOT NULL,
    start_time TEXT,
    command TEXT,
    comment TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS backups (
    server_id INTEGER PRIMARY KEY,
    directories TEXT NOT NULL DEFAULT '[]',
    storage_location TEXT NOT NULL,
    max_backups INTEGER NOT NULL DEFAULT 7
);

CREATE TABLE IF NOT EXISTS panel_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    history_interval INTEGER NOT NULL DEFAULT 60,
    history_max_age INTEGER NOT NULL DEFAULT 2
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id INTEGER NOT NULL,
    time TEXT NOT NULL,
    cpu REAL NOT NULL,
    memory REAL NOT NULL,
    players INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_history_time ON history(time);
CREATE INDEX IF NOT EXISTS idx_history_server ON history(server_id);
CREATE INDEX IF NOT EXISTS idx_schedules_server ON schedules(server_id);
"#;
