//! Show the status artifacts the daemon publishes

use anyhow::{bail, Context, Result};
use mcpanel_core::{constants, StatusSnapshot};
use std::path::Path;
use tracing::warn;

use crate::output;
use crate::Paths;

pub async fn execute(paths: &Paths, server: Option<u32>) -> Result<()> {
    let snapshots = match server {
        Some(id) => {
            let path = constants::status_path(&paths.status_dir, id);
            if !path.exists() {
                bail!("No status published for server {}", id);
            }
            vec![read_snapshot(&path)?]
        }
        None => read_all(&paths.status_dir)?,
    };

    output::print_status_table(&snapshots);
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<StatusSnapshot> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Every `server_<id>.json` in the directory, ordered by server id
fn read_all(dir: &Path) -> Result<Vec<StatusSnapshot>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_artifact = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("server_") && n.ends_with(".json"))
            .unwrap_or(false);
        if !is_artifact {
            continue;
        }

        match read_snapshot(&path) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => warn!("Skipping unreadable status artifact: {:#}", e),
        }
    }

    snapshots.sort_by_key(|s| s.server_id);
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_all_skips_foreign_and_broken_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server_1.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("server-1-console.log"), "[INFO] hi").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let snapshots = read_all(dir.path()).unwrap();
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_read_all_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(read_all(&dir.path().join("absent")).unwrap().is_empty());
    }
}
