//! User schedule management

use anyhow::{bail, Result};
use mcpanel_core::ScheduleDefinition;

use crate::cli::AddScheduleArgs;
use crate::output;
use crate::Paths;

const RELOAD_HINT: &str = "Submit reload_schedules for the daemon to pick this up";

pub async fn list(paths: &Paths) -> Result<()> {
    let db = super::open_db(paths).await?;
    let defs = db.schedules().get_all().await?;
    db.close().await;

    output::print_schedules(&defs);
    Ok(())
}

pub async fn add(paths: &Paths, args: AddScheduleArgs) -> Result<()> {
    let def = ScheduleDefinition {
        id: 0,
        server_id: args.server,
        enabled: !args.disabled,
        action: args.action.to_lowercase(),
        interval: args.interval,
        interval_type: args.unit.to_lowercase(),
        start_time: args.at,
        command: args.command,
        comment: args.comment,
    };
    def.validate()?;

    let db = super::open_db(paths).await?;
    if db.servers().get_by_id(def.server_id).await?.is_none() {
        db.close().await;
        bail!("Server not found: {}", def.server_id);
    }
    let id = db.schedules().insert(&def).await?;
    db.close().await;

    output::print_success(&format!("Added schedule {}", id));
    output::print_info(RELOAD_HINT);
    Ok(())
}

pub async fn set_enabled(paths: &Paths, id: u32, enabled: bool) -> Result<()> {
    let db = super::open_db(paths).await?;
    let updated = db.schedules().set_enabled(id, enabled).await?;
    db.close().await;

    if !updated {
        bail!("Schedule not found: {}", id);
    }

    let verb = if enabled { "Enabled" } else { "Disabled" };
    output::print_success(&format!("{} schedule {}", verb, id));
    output::print_info(RELOAD_HINT);
    Ok(())
}

pub async fn remove(paths: &Paths, id: u32) -> Result<()> {
    let db = super::open_db(paths).await?;
    let deleted = db.schedules().delete(id).await?;
    db.close().await;

    if !deleted {
        bail!("Schedule not found: {}", id);
    }

    output::print_success(&format!("Removed schedule {}", id));
    output::print_info(RELOAD_HINT);
    Ok(())
}
