//! Servers repository - managed server settings

use mcpanel_core::{Error, Result, ServerSettings};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::PathBuf;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, server_path, server_jar, memory_min, memory_max,
           additional_args, pre_args, auto_start, auto_start_delay,
           auto_start_priority, server_ip, server_port, crash_detection
    FROM servers
"#;

/// Repository for server settings
pub struct ServersRepository {
    pool: SqlitePool,
}

impl ServersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new server, returning its id
    pub async fn insert(&self, settings: &ServerSettings) -> Result<u32> {
        settings.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO servers (
                name, server_path, server_jar, memory_min, memory_max,
                additional_args, pre_args, auto_start, auto_start_delay,
                auto_start_priority, server_ip, server_port, crash_detection
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&settings.name)
        .bind(settings.server_path.to_string_lossy().to_string())
        .bind(&settings.server_jar)
        .bind(settings.memory_min as i64)
        .bind(settings.memory_max as i64)
        .bind(&settings.additional_args)
        .bind(&settings.pre_args)
        .bind(settings.auto_start)
        .bind(settings.auto_start_delay as i64)
        .bind(settings.auto_start_priority as i64)
        .bind(&settings.server_ip)
        .bind(settings.server_port as i64)
        .bind(settings.crash_detection)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.last_insert_rowid() as u32)
    }

    /// Overwrite an existing server row
    pub async fn update(&self, settings: &ServerSettings) -> Result<bool> {
        settings.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE servers SET
                name = ?, server_path = ?, server_jar = ?, memory_min = ?, memory_max = ?,
                additional_args = ?, pre_args = ?, auto_start = ?, auto_start_delay = ?,
                auto_start_priority = ?, server_ip = ?, server_port = ?, crash_detection = ?
            WHERE id = ?
            "#,
        )
        .bind(&settings.name)
        .bind(settings.server_path.to_string_lossy().to_string())
        .bind(&settings.server_jar)
        .bind(settings.memory_min as i64)
        .bind(settings.memory_max as i64)
        .bind(&settings.additional_args)
        .bind(&settings.pre_args)
        .bind(settings.auto_start)
        .bind(settings.auto_start_delay as i64)
        .bind(settings.auto_start_priority as i64)
        .bind(&settings.server_ip)
        .bind(settings.server_port as i64)
        .bind(settings.crash_detection)
        .bind(settings.id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get server by ID
    pub async fn get_by_id(&self, id: u32) -> Result<Option<ServerSettings>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        row.as_ref().map(row_to_settings).transpose()
    }

    /// Get all servers
    pub async fn get_all(&self) -> Result<Vec<ServerSettings>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_settings).collect()
    }

    /// Delete server by ID
    pub async fn delete(&self, id: u32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM servers WHERE id = ?")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_settings(row: &SqliteRow) -> Result<ServerSettings> {
    let id: i64 = row.get("id");
    let server_path: String = row.get("server_path");
    let memory_min: i64 = row.get("memory_min");
    let memory_max: i64 = row.get("memory_max");
    let auto_start_delay: i64 = row.get("auto_start_delay");
    let auto_start_priority: i64 = row.get("auto_start_priority");
    let server_port: i64 = row.get("server_port");

    let server_port = u16::try_from(server_port)
        .map_err(|_| Error::DbError(format!("Server {} has invalid port {}", id, server_port)))?;

    Ok(ServerSettings {
        id: id as u32,
        name: row.get("name"),
        server_path: PathBuf::from(server_path),
        server_jar: row.get("server_jar"),
        memory_min: memory_min as u32,
        memory_max: memory_max as u32,
        additional_args: row.get("additional_args"),
        pre_args: row.get("pre_args"),
        auto_start: row.get("auto_start"),
        auto_start_delay: auto_start_delay.max(0) as u64,
        auto_start_priority: auto_start_priority as i32,
        server_ip: row.get("server_ip"),
        server_port,
        crash_detection: row.get("crash_detection"),
    })
}
