//! Error and warning counts from the server's own log

use mcpanel_core::{constants, Result};
use std::path::Path;

use crate::reader::LogReader;

const ERROR_MARKER: &str = "ERROR]";
const WARN_MARKER: &str = "WARN]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemCounts {
    pub errors: usize,
    pub warnings: usize,
}

pub fn count_problems<S: AsRef<str>>(lines: &[S]) -> ProblemCounts {
    lines.iter().fold(ProblemCounts::default(), |mut counts, line| {
        let line = line.as_ref();
        if line.contains(ERROR_MARKER) {
            counts.errors += 1;
        } else if line.contains(WARN_MARKER) {
            counts.warnings += 1;
        }
        counts
    })
}

/// Count problems in the last lines of `latest.log`; a missing log counts as clean
pub fn scan_latest_log(path: &Path) -> Result<ProblemCounts> {
    let lines = LogReader::new(path.to_path_buf()).tail(constants::LOG_SCAN_LINES)?;
    Ok(count_problems(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_count_problems() {
        let lines = [
            "[10:00:01] [Server thread/INFO]: Starting minecraft server",
            "[10:00:02] [Server thread/WARN]: Can't keep up!",
            "[10:00:03] [Server thread/ERROR]: Encountered an unexpected exception",
            "[10:00:04] [Server thread/WARN]: Ambiguity between arguments",
        ];
        let counts = count_problems(&lines);
        assert_eq!(counts, ProblemCounts { errors: 1, warnings: 2 });
    }

    #[test]
    fn test_scan_missing_log() {
        let counts = scan_latest_log(Path::new("/nonexistent/logs/latest.log")).unwrap();
        assert_eq!(counts, ProblemCounts::default());
    }

    #[test]
    fn test_scan_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latest.log");
        std::fs::write(&path, "[x/ERROR]: boom\n[x/INFO]: ok\n").unwrap();

        assert_eq!(scan_latest_log(&path).unwrap().errors, 1);
    }
}
