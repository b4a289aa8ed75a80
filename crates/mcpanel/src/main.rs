//! mcpanel CLI - talks to the daemon through the settings store

use anyhow::Result;
use clap::Parser;
use mcpanel_core::PanelConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, ScheduleCommands};

/// Where the CLI finds the daemon's store and status artifacts
pub struct Paths {
    pub db: PathBuf,
    pub status_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PanelConfig::load()?;
    let paths = Paths {
        db: cli.db.unwrap_or(config.db_path),
        status_dir: cli.status_dir.unwrap_or(config.status_dir),
    };

    match cli.command {
        Commands::Submit {
            kind,
            server,
            source,
        } => commands::submit::execute(&paths, &kind, server, &source).await,
        Commands::Status { server } => commands::status::execute(&paths, server).await,
        Commands::Decide { answer, server } => {
            commands::decide::execute(&paths, answer, server).await
        }
        Commands::Schedules(cmd) => match cmd {
            ScheduleCommands::List => commands::schedules::list(&paths).await,
            ScheduleCommands::Add(args) => commands::schedules::add(&paths, args).await,
            ScheduleCommands::Enable { id } => {
                commands::schedules::set_enabled(&paths, id, true).await
            }
            ScheduleCommands::Disable { id } => {
                commands::schedules::set_enabled(&paths, id, false).await
            }
            ScheduleCommands::Remove { id } => commands::schedules::remove(&paths, id).await,
        },
        Commands::Backups { server } => commands::backups::execute(&paths, server).await,
    }
}
