//! Schedules repository - admin-defined jobs

use mcpanel_core::{Error, Result, ScheduleDefinition};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for schedule definitions
pub struct SchedulesRepository {
    pool: SqlitePool,
}

impl SchedulesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a schedule, returning its id
    pub async fn insert(&self, def: &ScheduleDefinition) -> Result<u32> {
        let result = sqlx::query(
            r#"
            INSERT INTO schedules (
                server_id, enabled, action, interval, interval_type, start_time, command, comment
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(def.server_id as i64)
        .bind(def.enabled)
        .bind(&def.action)
        .bind(def.interval as i64)
        .bind(&def.interval_type)
        .bind(def.start_time.as_deref())
        .bind(def.command.as_deref())
        .bind(&def.comment)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.last_insert_rowid() as u32)
    }

    /// Get all schedules, enabled or not
    pub async fn get_all(&self) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, server_id, enabled, action, interval, interval_type,
                   start_time, command, comment
            FROM schedules ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(rows.iter().map(row_to_schedule).collect())
    }

    /// Enable or disable a schedule
    pub async fn set_enabled(&self, id: u32, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE schedules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a schedule
    pub async fn delete(&self, id: u32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_schedule(row: &SqliteRow) -> ScheduleDefinition {
    let id: i64 = row.get("id");
    let server_id: i64 = row.get("server_id");
    let interval: i64 = row.get("interval");

    ScheduleDefinition {
        id: id as u32,
        server_id: server_id as u32,
        enabled: row.get("enabled"),
        action: row.get("action"),
        interval: interval.max(0) as u32,
        interval_type: row.get("interval_type"),
        start_time: row.get("start_time"),
        command: row.get("command"),
        comment: row.get("comment"),
    }
}
