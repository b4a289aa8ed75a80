//! Error types for mcpanel

use std::path::PathBuf;

use crate::types::ServerState;

/// mcpanel error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Server not found: {0}")]
    ServerNotFound(u32),

    #[error("Server not running: {0}")]
    NotRunning(u32),

    #[error("Invalid transition for server {server_id}: {from} -> {to}")]
    InvalidTransition {
        server_id: u32,
        from: ServerState,
        to: ServerState,
    },

    #[error("Decision pending for server {0}")]
    DecisionPending(u32),

    #[error("No pending decision for server {0}")]
    NoPendingDecision(u32),

    #[error("Process failed to start: {0}")]
    ProcessStartFailed(String),

    #[error("Settings error: {0}")]
    SettingsError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Ping failed: {0}")]
    PingFailed(String),

    #[error("Archive failed: {0}")]
    ArchiveFailed(String),

    #[error("Transfer service error: {0}")]
    TransferError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for mcpanel
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn settings<S: Into<String>>(msg: S) -> Self {
        Error::SettingsError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    pub fn process_start<S: Into<String>>(msg: S) -> Self {
        Error::ProcessStartFailed(msg.into())
    }

    pub fn ping<S: Into<String>>(msg: S) -> Self {
        Error::PingFailed(msg.into())
    }

    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Error::ArchiveFailed(msg.into())
    }
}
