//! Process launcher capability.
//!
//! The lifecycle supervisor spawns detached broker/agent processes and
//! probes PID liveness through this trait so tests can substitute a fake
//! launcher for real OS processes.

use std::process::{Command, Stdio};

use anyhow::Context;

/// Start-detached / is-alive-by-pid capability.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the current executable with `args` as a detached child that
    /// survives the parent's exit. Returns the child PID.
    fn spawn_detached(&self, args: &[String]) -> anyhow::Result<u32>;

    /// Zero-signal liveness check.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Launcher backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessLauncher;

impl OsProcessLauncher {
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for OsProcessLauncher {
    fn spawn_detached(&self, args: &[String]) -> anyhow::Result<u32> {
        let exe_path = std::env::current_exe().context("failed to resolve current executable")?;
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;

        let mut command = Command::new(&exe_path);
        command
            .args(args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // New process group so the child is not reaped with our session.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn detached process: {args:?}"))?;
        Ok(child.id())
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            match i32::try_from(pid) {
                Ok(raw) => kill(Pid::from_raw(raw), None).is_ok(),
                Err(_) => false,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
            false
        }
    }
}
