//! Drift scan handler.
//!
//! Long-running analysis pass comparing the project against its specs,
//! reporting stepwise progress. The analysis body is currently a
//! simulated ten-step loop.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::handler::{TaskContext, TaskHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct DriftScanHandler;

impl DriftScanHandler {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for DriftScanHandler {
    fn kind(&self) -> &'static str {
        "drift-scan"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        info!(task_id = %ctx.task_id, "running drift analysis");

        for step in 0..=10u8 {
            ctx.progress
                .update(step * 10, format!("Analyzing files... ({step}/10)"));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        info!(task_id = %ctx.task_id, "drift analysis completed");
        Ok(())
    }
}
