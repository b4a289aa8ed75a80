//! Status artifact helpers
//!
//! The web layer reads one JSON file per server. Everything here is
//! best effort: a missing world, log or properties file degrades to a
//! placeholder instead of failing the publish.

use mcpanel_core::{
    constants, human_readable_size, OnlineStats, Result, ServerSettings, StatusSnapshot, WorldInfo,
};
use mcpanel_logs::{scan_latest_log, ProblemCounts};
use mcpanel_ping::PingStatus;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const UNREACHABLE: &str = "Unable to Connect";
pub const PROXY_WORLD_NOTICE: &str = "Proxy install, no world data";

/// `level-name` from `server.properties`, if present
pub fn level_name(server_path: &Path) -> Option<String> {
    let content = fs::read_to_string(server_path.join(constants::SERVER_PROPERTIES)).ok()?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .find(|(key, _)| key.trim() == "level-name")
        .map(|(_, value)| value.trim().to_string())
}

/// Total size of every directory literally named `region` under `root`
pub fn region_size(root: &Path) -> u64 {
    let mut total = 0;
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_dir() && entry.file_name() == constants::REGION_DIR {
            total += dir_size(entry.path());
            walker.skip_current_dir();
        }
    }

    total
}

fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

pub fn world_info(settings: &ServerSettings) -> WorldInfo {
    if settings.is_proxy_flavor() {
        return WorldInfo {
            world_name: PROXY_WORLD_NOTICE.to_string(),
            world_size: human_readable_size(0),
        };
    }

    WorldInfo {
        world_name: level_name(&settings.server_path).unwrap_or_else(|| "Unknown".to_string()),
        world_size: human_readable_size(region_size(&settings.server_path)),
    }
}

/// World data and log problems; walks the install dir, so run it off the async threads
pub fn scan_install(settings: &ServerSettings) -> (WorldInfo, ProblemCounts) {
    let problems = scan_latest_log(&settings.latest_log_path()).unwrap_or_default();
    (world_info(settings), problems)
}

/// Description, version and player stats, or the unreachable placeholder
pub fn live_fields(ping: Option<PingStatus>) -> (String, String, OnlineStats) {
    match ping {
        Some(status) => {
            let stats = status.online_stats();
            (status.description, status.version, stats)
        }
        None => (
            UNREACHABLE.to_string(),
            UNREACHABLE.to_string(),
            OnlineStats::default(),
        ),
    }
}

/// Overwrite the artifact through a temp file and rename
pub fn write_atomic(path: &Path, snapshot: &StatusSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
