//! Table and JSON output

use colored::Colorize;
use mcpanel_core::{BackupEntry, ScheduleDefinition, ServerState, StatusSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[derive(Tabled)]
pub struct StatusRow {
    #[tabled(rename = "id")]
    pub id: u32,
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "status")]
    pub status: String,
    #[tabled(rename = "players")]
    pub players: String,
    #[tabled(rename = "cpu")]
    pub cpu: String,
    #[tabled(rename = "mem")]
    pub mem: String,
    #[tabled(rename = "world")]
    pub world: String,
    #[tabled(rename = "version")]
    pub version: String,
    #[tabled(rename = "decision")]
    pub decision: String,
}

impl From<&StatusSnapshot> for StatusRow {
    fn from(s: &StatusSnapshot) -> Self {
        StatusRow {
            id: s.server_id,
            name: s.server_name.clone(),
            status: format_state(s.state),
            players: format!("{}/{}", s.online_stats.online, s.online_stats.max),
            cpu: format!("{:.1}%", s.cpu_usage),
            mem: format!("{:.1}%", s.mem_percent),
            world: format!("{} ({})", s.world_data.world_name, s.world_data.world_size),
            version: s.server_version.clone(),
            decision: s
                .pending_decision
                .as_ref()
                .map(|d| format!("#{} until {}", d.id, d.deadline.format("%H:%M:%S")))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn print_status_table(snapshots: &[StatusSnapshot]) {
    if is_json_mode() {
        print_json(snapshots);
        return;
    }

    if snapshots.is_empty() {
        println!("No status published yet");
        return;
    }

    print_table(snapshots.iter().map(StatusRow::from).collect());
}

#[derive(Tabled)]
pub struct ScheduleRow {
    #[tabled(rename = "id")]
    pub id: u32,
    #[tabled(rename = "server")]
    pub server: u32,
    #[tabled(rename = "enabled")]
    pub enabled: String,
    #[tabled(rename = "action")]
    pub action: String,
    #[tabled(rename = "every")]
    pub every: String,
    #[tabled(rename = "at")]
    pub at: String,
    #[tabled(rename = "comment")]
    pub comment: String,
}

impl From<&ScheduleDefinition> for ScheduleRow {
    fn from(def: &ScheduleDefinition) -> Self {
        let action = match def.command.as_deref() {
            Some(text) if def.action == "command" => format!("command: {}", text),
            _ => def.action.clone(),
        };
        ScheduleRow {
            id: def.id,
            server: def.server_id,
            enabled: if def.enabled {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
            action,
            every: format!("{} {}", def.interval, def.interval_type),
            at: def.start_time.clone().unwrap_or_else(|| "-".to_string()),
            comment: def.comment.clone(),
        }
    }
}

pub fn print_schedules(defs: &[ScheduleDefinition]) {
    if is_json_mode() {
        print_json(defs);
        return;
    }

    if defs.is_empty() {
        println!("No schedules");
        return;
    }

    print_table(defs.iter().map(ScheduleRow::from).collect());
}

#[derive(Tabled)]
pub struct BackupRow {
    #[tabled(rename = "archive")]
    pub archive: String,
    #[tabled(rename = "size")]
    pub size: String,
}

pub fn print_backups(entries: &[BackupEntry]) {
    if is_json_mode() {
        print_json(entries);
        return;
    }

    if entries.is_empty() {
        println!("No backups");
        return;
    }

    print_table(
        entries
            .iter()
            .map(|e| BackupRow {
                archive: e.path.display().to_string(),
                size: e.size.clone(),
            })
            .collect(),
    );
}

fn format_state(state: ServerState) -> String {
    match state {
        ServerState::Running => "running".green().to_string(),
        ServerState::Stopped => "stopped".red().to_string(),
        ServerState::Crashed => "crashed".red().bold().to_string(),
        ServerState::Starting => "starting".yellow().to_string(),
        ServerState::Stopping => "stopping".yellow().to_string(),
    }
}

pub fn print_success(message: &str) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "success": true, "message": message }));
    } else {
        println!("{} {}", "✓".green(), message);
    }
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    if !is_json_mode() {
        println!("{} {}", "ℹ".blue(), message);
    }
}
