//! mcpanel Logs - console capture, tailing and problem scanning

mod reader;
mod rotation;
mod scan;
mod writer;

pub use reader::LogReader;
pub use rotation::RotationConfig;
pub use scan::{count_problems, scan_latest_log, ProblemCounts};
pub use writer::{spawn_console_capture, LogWriter};

use mcpanel_core::{constants, Result};
use std::path::{Path, PathBuf};

/// Console capture file of a server inside `dir`
pub fn console_path(dir: &Path, server_id: u32) -> PathBuf {
    constants::console_log_path(dir, server_id)
}

/// Ensure a log directory exists
pub fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
