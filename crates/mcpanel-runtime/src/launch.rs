//! Launch command assembly

use mcpanel_core::{constants, Error, Result, ServerSettings};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Build the single shell line that starts a server:
/// `<binary> -Xms<min>M -Xmx<max>M <pre> -jar <path>/<jar> nogui <post>`
///
/// The install path is double-quoted when it contains whitespace.
pub fn build_launch_command(settings: &ServerSettings, binary: &str) -> String {
    let path = settings.server_path.to_string_lossy();
    let path = if path.chars().any(char::is_whitespace) {
        format!("\"{}\"", path)
    } else {
        path.to_string()
    };

    let mut parts = vec![
        binary.to_string(),
        format!("-Xms{}M", settings.memory_min),
        format!("-Xmx{}M", settings.memory_max),
    ];
    if !settings.pre_args.trim().is_empty() {
        parts.push(settings.pre_args.trim().to_string());
    }
    parts.push("-jar".to_string());
    parts.push(format!("{}/{}", path, settings.server_jar));
    parts.push("nogui".to_string());
    if !settings.additional_args.trim().is_empty() {
        parts.push(settings.additional_args.trim().to_string());
    }

    parts.join(" ")
}

/// Graceful shutdown keyword for this install
pub fn stop_keyword(settings: &ServerSettings) -> &'static str {
    if settings.is_proxy_flavor() {
        constants::PROXY_STOP_KEYWORD
    } else {
        constants::STOP_KEYWORD
    }
}

/// Check that the runtime binary resolves and the install looks usable
pub fn prepare(settings: &ServerSettings, binary: &str) -> Result<PathBuf> {
    let resolved = which::which(binary)
        .map_err(|e| Error::process_start(format!("Runtime '{}' not found: {}", binary, e)))?;
    debug!("Runtime {} resolved to {}", binary, resolved.display());

    if !settings.server_path.is_dir() {
        return Err(Error::process_start(format!(
            "Install directory does not exist: {}",
            settings.server_path.display()
        )));
    }

    let jar = Path::new(&settings.server_path).join(&settings.server_jar);
    if !jar.exists() {
        return Err(Error::process_start(format!(
            "Server jar not found: {}",
            jar.display()
        )));
    }

    Ok(resolved)
}
