//! Backup engine: archive plus time-based retention

use chrono::Local;
use flate2::{write::GzEncoder, Compression};
use mcpanel_core::{constants, BackupConfig, BackupEntry, Error, Result};
use mcpanel_db::Database;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tar::Builder;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::registry::ServerRegistry;
use crate::supervisor::Supervisor;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Builds one archive at `dest` from `sources`, leaving out anything under `exclude`
pub trait Archiver: Send + Sync {
    fn build(&self, dest: &Path, sources: &[PathBuf], exclude: &Path) -> Result<()>;
}

/// Gzip-compressed tarball; each source lands under its own file name
#[derive(Debug, Default)]
pub struct TarGzArchiver;

impl TarGzArchiver {
    fn write_archive(dest: &Path, sources: &[PathBuf], exclude: &Path) -> Result<()> {
        let file = File::create(dest)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);

        for source in sources {
            if !source.exists() {
                return Err(Error::archive(format!(
                    "Source path doesn't exist: {}",
                    source.display()
                )));
            }
            let prefix = source.file_name().map(PathBuf::from).unwrap_or_default();

            for entry in WalkDir::new(source)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !e.path().starts_with(exclude))
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };

                let Ok(relative) = entry.path().strip_prefix(source) else {
                    continue;
                };
                let name = prefix.join(relative);
                if name.as_os_str().is_empty() {
                    continue;
                }

                let file_type = entry.file_type();
                if file_type.is_dir() {
                    builder.append_dir(&name, entry.path())?;
                } else if file_type.is_file() || file_type.is_symlink() {
                    builder.append_path_with_name(entry.path(), &name)?;
                }
            }
        }

        builder.into_inner()?.finish()?.flush()?;
        Ok(())
    }
}

impl Archiver for TarGzArchiver {
    fn build(&self, dest: &Path, sources: &[PathBuf], exclude: &Path) -> Result<()> {
        let result = Self::write_archive(dest, sources, exclude);
        if result.is_err() && dest.exists() {
            if let Err(e) = fs::remove_file(dest) {
                warn!("Failed to remove partial archive {}: {}", dest.display(), e);
            }
        }
        result
    }
}

/// Delete regular files in `dir` whose modification time is strictly
/// more than `max_age` before `now`
pub fn prune_older_than(dir: &Path, max_age: Duration, now: SystemTime) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut stale = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let Ok(age) = now.duration_since(modified) else {
            continue;
        };

        if age > max_age {
            stale.push(entry.path());
        }
    }

    Ok(remove_each(stale))
}

/// Remove every path, logging failures; returns the paths actually removed
fn remove_each(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut removed = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed old backup {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Failed to remove old backup {}: {}", path.display(), e),
        }
    }
    removed
}

#[derive(Debug, Default)]
pub struct BackupReport {
    /// Archive written, if the build succeeded
    pub archive: Option<PathBuf>,
    pub pruned: Vec<PathBuf>,
    pub error: Option<String>,
}

pub struct BackupEngine {
    db: Database,
    registry: Arc<ServerRegistry>,
    archiver: Arc<dyn Archiver>,
}

impl BackupEngine {
    pub fn new(db: Database, registry: Arc<ServerRegistry>, archiver: Arc<dyn Archiver>) -> Self {
        Self {
            db,
            registry,
            archiver,
        }
    }

    async fn load_config(&self, server_id: u32) -> Result<BackupConfig> {
        self.db
            .backups()
            .get(server_id)
            .await?
            .ok_or_else(|| Error::settings(format!("No backup configuration for server {}", server_id)))
    }

    /// Archive one server, then apply retention whatever the archive outcome
    pub async fn backup(&self, server_id: u32, announce: bool) -> Result<BackupReport> {
        let config = self.load_config(server_id).await?;
        let dest_dir = config.server_dir();
        fs::create_dir_all(&dest_dir)?;

        let supervisor = self.registry.get(server_id).ok();
        let _guard = match &supervisor {
            Some(s) => Some(s.lock_lifecycle().await),
            None => None,
        };

        info!("Starting backup of server {}", server_id);
        if announce {
            notify(supervisor.as_deref(), "Starting Backup of Server");
        }

        let archive = dest_dir.join(format!(
            "{}.tar.gz",
            Local::now().format(constants::BACKUP_TIME_FORMAT)
        ));
        let mut report = BackupReport::default();

        let archiver = Arc::clone(&self.archiver);
        let (dest, sources, exclude) = (
            archive.clone(),
            config.directories.clone(),
            config.storage_location.clone(),
        );
        let built = tokio::task::spawn_blocking(move || archiver.build(&dest, &sources, &exclude))
            .await
            .map_err(|e| Error::archive(e.to_string()))
            .and_then(|r| r);

        match built {
            Ok(()) => {
                info!("Backup written to {}", archive.display());
                if announce {
                    notify(supervisor.as_deref(), "Backup Complete");
                }
                report.archive = Some(archive);
            }
            Err(e) => {
                error!("Unable to create backup of server {}: {}", server_id, e);
                if announce {
                    notify(
                        supervisor.as_deref(),
                        "Unable to create backups - check the logs",
                    );
                }
                report.error = Some(e.to_string());
            }
        }

        let max_age = Duration::from_secs(u64::from(config.max_backups) * SECS_PER_DAY);
        info!(
            "Checking for backups older than {} days in {}",
            config.max_backups,
            dest_dir.display()
        );
        report.pruned = prune_older_than(&dest_dir, max_age, SystemTime::now())?;

        Ok(report)
    }

    /// Back up every registered server; returns how many archives were written
    pub async fn backup_all(&self, announce: bool) -> usize {
        let mut written = 0;
        for id in self.registry.ids() {
            match self.backup(id, announce).await {
                Ok(report) if report.archive.is_some() => written += 1,
                Ok(_) => {}
                Err(e) => error!("Backup of server {} failed: {}", id, e),
            }
        }
        written
    }

    pub async fn list_backups(&self, server_id: u32) -> Result<Vec<BackupEntry>> {
        self.load_config(server_id).await?.list_archives()
    }
}

fn notify(supervisor: Option<&Supervisor>, message: &str) {
    let Some(supervisor) = supervisor else {
        return;
    };
    if !supervisor.check_running() {
        return;
    }
    let line = format!("{} {}", constants::ANNOUNCE_PREFIX, message);
    if let Err(e) = supervisor.send_command(&line) {
        warn!("Failed to announce on server {}: {}", supervisor.id(), e);
    }
}
