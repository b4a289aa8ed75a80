//! Command slot repository - the single-slot remote command mailbox
//!
//! The table's primary key is pinned to 1, so the store itself refuses a
//! second row while one is pending.

use chrono::{DateTime, Utc};
use mcpanel_core::{CommandKind, Error, RemoteCommand, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::parse_time;
use tracing::warn;

/// Raw contents of the command slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    pub command: String,
    pub server_id: u32,
    pub source: String,
    pub submitted_at: DateTime<Utc>,
}

impl SlotEntry {
    /// Decode the stored command; unknown kinds are an error for the caller to log
    pub fn to_command(&self) -> Result<RemoteCommand> {
        let kind: CommandKind = self.command.parse()?;
        Ok(RemoteCommand::new(kind, self.server_id, self.source.clone()))
    }
}

/// Repository for the command slot
pub struct RemoteRepository {
    pool: SqlitePool,
}

impl RemoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a command; returns false when the slot is already occupied
    pub async fn submit(&self, command: &RemoteCommand) -> Result<bool> {
        self.submit_raw(command.kind.as_str(), command.server_id, &command.source)
            .await
    }

    /// Append a raw command string, bypassing kind validation
    pub async fn submit_raw(&self, command: &str, server_id: u32, source: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO remote_commands (id, command, server_id, command_source)
            VALUES (1, ?, ?, ?)
            "#,
        )
        .bind(command)
        .bind(server_id as i64)
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Read the pending command without removing it
    pub async fn peek(&self) -> Result<Option<SlotEntry>> {
        let row = sqlx::query(
            r#"
            SELECT command, server_id, command_source, submitted_at
            FROM remote_commands WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let command: String = row.try_get("command").map_err(undecodable)?;
        let server_id: i64 = row.try_get("server_id").map_err(undecodable)?;
        let server_id = u32::try_from(server_id).map_err(|_| {
            Error::InvalidCommand(format!("server id {} out of range", server_id))
        })?;
        let source: String = row.try_get("command_source").map_err(undecodable)?;
        let submitted_at: Option<String> = row.try_get("submitted_at").unwrap_or(None);

        Ok(Some(SlotEntry {
            command,
            server_id,
            source,
            submitted_at: submitted_at_or_now(submitted_at.as_deref()),
        }))
    }

    /// Empty the slot
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM remote_commands")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Rows written by other tools may hold anything; a column that will not
/// decode makes the whole row an invalid command
fn undecodable(e: sqlx::Error) -> Error {
    Error::InvalidCommand(format!("undecodable slot row: {}", e))
}

fn submitted_at_or_now(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    parse_time(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc)))
        .unwrap_or_else(|_| {
            warn!("Unreadable submitted_at '{}' in command slot", raw);
            Utc::now()
        })
}
