//! Command implementations

pub mod backups;
pub mod decide;
pub mod schedules;
pub mod status;
pub mod submit;

use anyhow::Result;
use mcpanel_db::Database;

use crate::Paths;

/// Open the daemon's settings store
pub async fn open_db(paths: &Paths) -> Result<Database> {
    if let Some(parent) = paths.db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::new(&paths.db).await?)
}
