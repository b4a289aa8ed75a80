//! Host process table queries

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::VecDeque;
use sysinfo::{Pid, System};
use tracing::{debug, warn};

/// Liveness probe: does `pid` exist in the OS process table?
pub fn pid_exists(pid: u32) -> bool {
    match kill(NixPid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // Exists but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// An untracked process running a server jar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanProcess {
    pub pid: u32,
    pub cmdline: String,
}

/// Snapshot of the host process table
pub struct ProcessTable {
    system: System,
}

impl ProcessTable {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_processes();
        Self { system }
    }

    pub fn refresh(&mut self) {
        self.system.refresh_processes();
    }

    /// All descendants of `root`, parents before children
    pub fn descendants(&self, root: u32) -> Vec<u32> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([root]);

        while let Some(parent) = queue.pop_front() {
            for (pid, process) in self.system.processes() {
                if process.parent().map(|p| p.as_u32()) == Some(parent) {
                    let pid = pid.as_u32();
                    if pid != root && !found.contains(&pid) {
                        found.push(pid);
                        queue.push_back(pid);
                    }
                }
            }
        }

        found
    }

    /// First descendant of `root` whose process name is `name`
    pub fn find_descendant(&self, root: u32, name: &str) -> Option<u32> {
        self.descendants(root)
            .into_iter()
            .find(|pid| self.name(*pid).as_deref() == Some(name))
    }

    pub fn name(&self, pid: u32) -> Option<String> {
        self.system
            .process(Pid::from_u32(pid))
            .map(|p| p.name().to_string())
    }

    /// Processes named `process_name` whose command line mentions `jar`,
    /// minus the pids in `owned`
    pub fn find_jar_processes(&self, process_name: &str, jar: &str, owned: &[u32]) -> Vec<OrphanProcess> {
        let mut orphans: Vec<OrphanProcess> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, process)| {
                process.name() == process_name && !owned.contains(&pid.as_u32())
            })
            .filter_map(|(pid, process)| {
                let cmdline = process.cmd().join(" ");
                cmdline.contains(jar).then(|| OrphanProcess {
                    pid: pid.as_u32(),
                    cmdline,
                })
            })
            .collect();

        orphans.sort_by_key(|o| o.pid);
        orphans
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Kill `pid` and everything under it, deepest children first.
///
/// Returns the number of processes signalled.
pub fn kill_tree(pid: u32, signal: Signal) -> usize {
    let table = ProcessTable::new();
    let mut victims = table.descendants(pid);
    victims.reverse();
    victims.push(pid);

    let mut signalled = 0;
    for victim in victims {
        match kill(NixPid::from_raw(victim as i32), signal) {
            Ok(()) => {
                debug!("Sent {} to {}", signal, victim);
                signalled += 1;
            }
            Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to signal {}: {}", victim, e),
        }
    }
    signalled
}
