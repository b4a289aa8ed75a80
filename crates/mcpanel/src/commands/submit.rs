//! Submit a command to the daemon's command slot

use anyhow::{bail, Result};
use mcpanel_core::{CommandKind, RemoteCommand};

use crate::output;
use crate::Paths;

pub async fn execute(paths: &Paths, kind: &str, server: u32, source: &str) -> Result<()> {
    let kind: CommandKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            let known: Vec<&str> = CommandKind::ALL.iter().map(|k| k.as_str()).collect();
            bail!("{} (expected one of: {})", e, known.join(", "));
        }
    };

    let db = super::open_db(paths).await?;
    let accepted = db
        .remote()
        .submit(&RemoteCommand::new(kind, server, source))
        .await?;
    db.close().await;

    if !accepted {
        bail!("Command slot is busy, the daemon has not picked up the previous command yet");
    }

    output::print_success(&format!("Submitted {} for server {}", kind, server));
    Ok(())
}
