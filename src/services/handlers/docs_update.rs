//! Documentation update handler.
//!
//! Walks the archived spec set and regenerates project and user-facing
//! documentation in stages, reporting progress as it goes. The generation
//! stages are currently simulated waits; the progress contract is the
//! part the rest of the system depends on.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::handler::{TaskContext, TaskHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocsUpdateHandler;

impl DocsUpdateHandler {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for DocsUpdateHandler {
    fn kind(&self) -> &'static str {
        "docs-update"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        info!(task_id = %ctx.task_id, "starting documentation update");

        ctx.progress.update(10, "Collecting archived specs...");
        tokio::time::sleep(Duration::from_millis(500)).await;

        ctx.progress.update(40, "Generating project-level documentation...");
        tokio::time::sleep(Duration::from_secs(1)).await;

        ctx.progress.update(70, "Generating user-facing documentation...");
        tokio::time::sleep(Duration::from_secs(1)).await;

        ctx.progress.update(90, "Finalizing documentation files...");

        info!(task_id = %ctx.task_id, "documentation update completed");
        Ok(())
    }
}
