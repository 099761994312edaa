//! Ping handler: the smallest possible round-trip through the agent.

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::handler::{TaskContext, TaskHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

impl PingHandler {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for PingHandler {
    fn kind(&self) -> &'static str {
        "ping"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        info!(task_id = %ctx.task_id, "received PING");
        info!(task_id = %ctx.task_id, "PONG");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::handler::ProgressReporter;

    #[test]
    fn ping_always_succeeds() {
        let handler = PingHandler::new();
        let ctx = TaskContext::new("ping-1", ProgressReporter::new());
        tokio_test::block_on(handler.execute(&ctx)).unwrap();
    }
}
