//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mcpanel")]
#[command(version, about = "Control panel for self-hosted game servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings database (defaults to the daemon's)
    #[arg(long, env = "MCPANEL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Directory holding published status artifacts
    #[arg(long, env = "MCPANEL_STATUS_DIR", global = true)]
    pub status_dir: Option<PathBuf>,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Put a command in the daemon's command slot
    Submit {
        /// Command kind, e.g. start_server, backup_all, exit_panel
        kind: String,

        /// Target server id
        #[arg(short, long, default_value = "0")]
        server: u32,

        /// Recorded as the command's origin
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Show published server status
    Status {
        /// Only this server
        #[arg(short, long)]
        server: Option<u32>,
    },

    /// Answer a server's pending decision
    Decide {
        answer: Answer,

        #[arg(short, long)]
        server: u32,
    },

    /// Manage user schedules
    #[command(subcommand)]
    Schedules(ScheduleCommands),

    /// List backup archives of a server
    Backups {
        server: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Answer {
    Confirm,
    Decline,
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// List all schedules
    List,

    /// Add a schedule
    Add(AddScheduleArgs),

    /// Enable a schedule
    Enable { id: u32 },

    /// Disable a schedule
    Disable { id: u32 },

    /// Delete a schedule
    Remove { id: u32 },
}

#[derive(Args)]
pub struct AddScheduleArgs {
    /// Target server id
    #[arg(short, long)]
    pub server: u32,

    /// start, stop, restart, backup or command
    #[arg(short, long)]
    pub action: String,

    /// How many units between runs
    #[arg(short, long, default_value = "1")]
    pub interval: u32,

    /// seconds, minutes, hours, days or a weekday name
    #[arg(short, long)]
    pub unit: String,

    /// Wall-clock time (HH:MM) for day and weekday schedules
    #[arg(long)]
    pub at: Option<String>,

    /// Console text for `command` schedules
    #[arg(long)]
    pub command: Option<String>,

    /// Free-form note
    #[arg(long, default_value = "")]
    pub comment: String,

    /// Create the schedule disabled
    #[arg(long)]
    pub disabled: bool,
}
