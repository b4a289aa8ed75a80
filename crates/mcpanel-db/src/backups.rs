//! Backup config repository

use mcpanel_core::{BackupConfig, Error, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::PathBuf;

/// Repository for per-server backup configuration
pub struct BackupsRepository {
    pool: SqlitePool,
}

impl BackupsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the backup config of a server
    pub async fn upsert(&self, config: &BackupConfig) -> Result<()> {
        let directories: Vec<String> = config
            .directories
            .iter()
            .map(|d| d.to_string_lossy().to_string())
            .collect();
        let directories_json = serde_json::to_string(&directories)?;

        sqlx::query(
            r#"
            INSERT INTO backups (server_id, directories, storage_location, max_backups)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(server_id) DO UPDATE SET
                directories = excluded.directories,
                storage_location = excluded.storage_location,
                max_backups = excluded.max_backups
            "#,
        )
        .bind(config.server_id as i64)
        .bind(&directories_json)
        .bind(config.storage_location.to_string_lossy().to_string())
        .bind(config.max_backups as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    /// Read the current config of a server
    pub async fn get(&self, server_id: u32) -> Result<Option<BackupConfig>> {
        let row = sqlx::query(
            r#"
            SELECT server_id, directories, storage_location, max_backups
            FROM backups WHERE server_id = ?
            "#,
        )
        .bind(server_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => {
                let directories_json: String = row.get("directories");
                let storage_location: String = row.get("storage_location");
                let max_backups: i64 = row.get("max_backups");
                let directories: Vec<String> = serde_json::from_str(&directories_json)?;

                Ok(Some(BackupConfig {
                    server_id,
                    directories: directories.into_iter().map(PathBuf::from).collect(),
                    storage_location: PathBuf::from(storage_location),
                    max_backups: max_backups.max(0) as u32,
                }))
            }
            None => Ok(None),
        }
    }
}
