//! Supervision capability.
//!
//! Before a task is handed to a remote bus, something must make sure the
//! broker and at least one agent process are alive. The bus consumes this
//! as a trait so tests can substitute a recording fake.

use async_trait::async_trait;

/// Best-effort liveness and auto-start of the broker and agent processes.
///
/// Neither method guarantees the spawned process is serving when it
/// returns; callers needing a guarantee must retry at a higher level.
#[async_trait]
pub trait Supervision: Send + Sync {
    async fn ensure_broker_running(&self) -> anyhow::Result<()>;
    async fn ensure_agent_running(&self) -> anyhow::Result<()>;
}

/// Supervision that does nothing; for broker-host and test setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSupervision;

#[async_trait]
impl Supervision for NoSupervision {
    async fn ensure_broker_running(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn ensure_agent_running(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
