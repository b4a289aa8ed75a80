//! mcpanel Runtime - everything that touches host processes
//!
//! - [`launch`]: the one-line launch command and its prepare check
//! - [`pty`]: the shell a server runs under, behind a pseudo-terminal
//! - [`procs`]: process-table queries (descendants, orphans, liveness)
//! - [`metrics`]: host CPU, memory and disk usage

pub mod launch;
pub mod metrics;
pub mod procs;
pub mod pty;

pub use launch::{build_launch_command, prepare, stop_keyword};
pub use metrics::{HostMetrics, HostSampler};
pub use procs::{kill_tree, pid_exists, OrphanProcess, ProcessTable};
pub use pty::PtyShell;
