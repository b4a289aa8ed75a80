//! Console log rotation limits

use mcpanel_core::constants;

#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Size at which the console log rolls over
    pub max_size_bytes: u64,
    /// Rotated files kept next to the live one
    pub max_files: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: constants::DEFAULT_LOG_MAX_SIZE,
            max_files: constants::DEFAULT_LOG_MAX_FILES,
        }
    }
}

impl RotationConfig {
    pub fn new(max_size_bytes: u64, max_files: usize) -> Self {
        Self {
            max_size_bytes,
            max_files,
        }
    }
}
