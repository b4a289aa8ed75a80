//! Panel settings repository

use mcpanel_core::{Error, PanelSettings, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Repository for panel-wide settings (single row)
pub struct PanelRepository {
    pool: SqlitePool,
}

impl PanelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read settings, defaulting when the row was never written
    pub async fn get(&self) -> Result<PanelSettings> {
        let row = sqlx::query("SELECT history_interval, history_max_age FROM panel_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(match row {
            Some(row) => {
                let interval: i64 = row.get("history_interval");
                let max_age: i64 = row.get("history_max_age");
                PanelSettings {
                    history_interval: interval.max(1) as u32,
                    history_max_age: max_age.max(0) as u32,
                }
            }
            None => PanelSettings::default(),
        })
    }

    /// Write settings
    pub async fn set(&self, settings: &PanelSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO panel_settings (id, history_interval, history_max_age)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                history_interval = excluded.history_interval,
                history_max_age = excluded.history_max_age
            "#,
        )
        .bind(settings.history_interval as i64)
        .bind(settings.history_max_age as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }
}
