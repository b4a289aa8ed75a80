//! Host shell behind a pseudo-terminal
//!
//! The shell gets the pty slave as its controlling terminal and as all
//! three stdio handles. The master side stays with the caller: writes go
//! to the shell's input, reads return everything the shell and its
//! children print.

use mcpanel_core::{Error, Result};
use nix::pty::openpty;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub struct PtyShell {
    child: Child,
    pid: u32,
    master: File,
}

impl PtyShell {
    /// Spawn `shell` in `cwd`.
    ///
    /// Returns the shell together with a second handle on the pty master
    /// for draining output.
    pub fn spawn(shell: &str, cwd: &Path) -> Result<(Self, File)> {
        let pty = openpty(None, None)
            .map_err(|e| Error::process_start(format!("openpty failed: {}", e)))?;

        let stdin = pty.slave.try_clone()?;
        let stdout = pty.slave.try_clone()?;
        let stderr = pty.slave;

        let mut cmd = Command::new(shell);
        cmd.args(startup_flags(shell))
            .current_dir(cwd)
            .env("TERM", "dumb")
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        // New session with the pty as controlling terminal, so job control
        // and the terminal line discipline behave as in a login shell.
        // SAFETY: the closure runs between fork and exec and only makes
        // async-signal-safe calls (setsid, ioctl); it allocates nothing.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                if nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|e| {
            Error::process_start(format!("Failed to spawn shell '{}': {}", shell, e))
        })?;
        // Dropping the command closes our copies of the slave
        drop(cmd);

        let pid = child
            .id()
            .ok_or_else(|| Error::process_start("Shell started but no PID available"))?;

        let master = File::from(pty.master);
        let reader = master.try_clone()?;

        info!("Spawned shell {} (pid {}) in {}", shell, pid, cwd.display());
        Ok((Self { child, pid, master }, reader))
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Write one line to the shell's terminal
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        debug!("pty {} <- {}", self.pid, text);
        self.master.write_all(text.as_bytes())?;
        self.master.write_all(b"\n")?;
        self.master.flush()?;
        Ok(())
    }

    /// Reap the shell if it has exited
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Kill the shell and wait (bounded) for it to be reaped
    pub async fn terminate(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill shell {}: {}", self.pid, e);
            return;
        }
        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            warn!("Shell {} did not exit after kill", self.pid);
        }
    }
}

/// Flags that keep rc files out of the shell; only bash understands them
fn startup_flags(shell: &str) -> &'static [&'static str] {
    let is_bash = Path::new(shell)
        .file_name()
        .map(|name| name == "bash")
        .unwrap_or(false);
    if is_bash {
        &["--noprofile", "--norc"]
    } else {
        &[]
    }
}
