//! mcpanel Database - SQLite settings store

pub mod backups;
pub mod history;
pub mod panel;
pub mod remote;
pub mod schedules;
pub mod schema;
pub mod servers;

use chrono::{DateTime, NaiveDateTime, Utc};
use mcpanel_core::{constants, Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub use backups::BackupsRepository;
pub use history::HistoryRepository;
pub use panel::PanelRepository;
pub use remote::RemoteRepository;
pub use schedules::SchedulesRepository;
pub use servers::ServersRepository;

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DbError(e.to_string()))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        info!("Connecting to database: {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
                tracing::warn!("Failed to set database file permissions: {}", e);
            }
        }

        sqlx::query(schema::SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        info!("Database initialized");
        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get servers repository
    pub fn servers(&self) -> ServersRepository {
        ServersRepository::new(self.pool.clone())
    }

    /// Get command slot repository
    pub fn remote(&self) -> RemoteRepository {
        RemoteRepository::new(self.pool.clone())
    }

    /// Get schedules repository
    pub fn schedules(&self) -> SchedulesRepository {
        SchedulesRepository::new(self.pool.clone())
    }

    /// Get backup config repository
    pub fn backups(&self) -> BackupsRepository {
        BackupsRepository::new(self.pool.clone())
    }

    /// Get history repository
    pub fn history(&self) -> HistoryRepository {
        HistoryRepository::new(self.pool.clone())
    }

    /// Get panel settings repository
    pub fn panel(&self) -> PanelRepository {
        PanelRepository::new(self.pool.clone())
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.format(constants::DB_TIME_FORMAT).to_string()
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, constants::DB_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::DbError(format!("Bad timestamp '{}': {}", raw, e)))
}
