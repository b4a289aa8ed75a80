//! List a server's backup archives

use anyhow::{anyhow, Result};

use crate::output;
use crate::Paths;

pub async fn execute(paths: &Paths, server: u32) -> Result<()> {
    let db = super::open_db(paths).await?;
    let config = db.backups().get(server).await?;
    db.close().await;

    let config = config.ok_or_else(|| anyhow!("No backup configuration for server {}", server))?;
    let entries = config.list_archives()?;

    output::print_info(&format!(
        "Storage: {} (kept {} days)",
        config.server_dir().display(),
        config.max_backups
    ));
    output::print_backups(&entries);
    Ok(())
}
