//! Lifecycle supervision for the broker and agent processes.
//!
//! Best-effort auto-start: probe, spawn detached if dead, wait a fixed
//! grace period, and let the caller's connect attempt be the real
//! verdict. The agent side is tracked through a PID lock file under the
//! project-local state directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::domain::models::config::{AgentConfig, BrokerMode};
use crate::domain::ports::launcher::{OsProcessLauncher, ProcessLauncher};
use crate::domain::ports::supervision::Supervision;
use crate::infrastructure::queue::AGENT_DIR;

/// Lock file name inside the agent state directory.
const LOCK_FILE: &str = "agent.lock";

/// Grace period after spawning a broker before declaring it reachable.
const BROKER_START_GRACE: Duration = Duration::from_secs(2);

/// Grace period after spawning an agent.
const AGENT_START_GRACE: Duration = Duration::from_secs(1);

/// Timeout for the broker TCP liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Ensures a broker and a local agent are running, starting them as
/// detached children of the current executable when they are not.
pub struct LifecycleSupervisor {
    enabled: bool,
    broker_mode: BrokerMode,
    broker_host: String,
    broker_port: u16,
    lock_path: PathBuf,
    launcher: Box<dyn ProcessLauncher>,
}

impl LifecycleSupervisor {
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_launcher(config, Box::new(OsProcessLauncher::new()))
    }

    pub fn with_launcher(config: &AgentConfig, launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            enabled: config.enabled,
            broker_mode: config.broker,
            broker_host: config.broker_host(),
            broker_port: config.broker_port(),
            lock_path: Path::new(AGENT_DIR).join(LOCK_FILE),
            launcher,
        }
    }

    /// Point the lock file at an explicit path (tests use a temp dir).
    #[must_use]
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Record the current process as the project's agent.
    pub fn write_lock_file(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.lock_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&self.lock_path, std::process::id().to_string())
            .with_context(|| format!("failed to write {}", self.lock_path.display()))
    }

    /// Best-effort removal of the lock file; a missing file is fine.
    pub fn remove_lock_file(&self) {
        if let Err(err) = fs::remove_file(&self.lock_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.lock_path.display(), error = %err, "failed to remove agent lock file");
            }
        }
    }

    /// PID from the lock file, if the file exists and parses.
    fn locked_pid(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.lock_path).ok()?;
        contents.trim().parse().ok()
    }

    async fn broker_reachable(&self) -> bool {
        let target = format!("{}:{}", self.broker_host, self.broker_port);
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(&target)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl Supervision for LifecycleSupervisor {
    /// Probe the broker port; when nothing answers, spawn a detached
    /// broker process and give it a fixed grace period to bind. An
    /// externally managed broker is never auto-started from here.
    async fn ensure_broker_running(&self) -> anyhow::Result<()> {
        if !self.enabled || self.broker_mode == BrokerMode::External {
            return Ok(());
        }
        if self.broker_reachable().await {
            debug!(port = self.broker_port, "broker already reachable");
            return Ok(());
        }

        info!(port = self.broker_port, "broker not reachable, starting one");
        let pid = self
            .launcher
            .spawn_detached(&["agent".into(), "broker".into()])?;
        info!(pid, "broker process started");
        tokio::time::sleep(BROKER_START_GRACE).await;
        Ok(())
    }

    /// Check the lock file's PID with a zero signal; when the recorded
    /// process is gone (or the file is missing or stale), clear it and
    /// spawn a fresh detached agent.
    async fn ensure_agent_running(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(pid) = self.locked_pid() {
            if self.launcher.is_alive(pid) {
                debug!(pid, "agent already running");
                return Ok(());
            }
            debug!(pid, "agent lock file is stale, clearing it");
        }
        self.remove_lock_file();

        info!("agent not running, starting one");
        let pid = self
            .launcher
            .spawn_detached(&["agent".into(), "run".into()])?;
        info!(pid, "agent process started");
        tokio::time::sleep(AGENT_START_GRACE).await;
        Ok(())
    }
}
