//! Task handler contract.
//!
//! A handler variant implements the business logic for one task `type`.
//! The scheduler only knows this trait; variants are wired up through
//! `services::registry::HandlerRegistry`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::models::task::TaskProgress;

/// Shared progress cell a running handler writes into.
///
/// Cloned freely; the scheduler and the tool server read the same cell.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    cell: Arc<Mutex<TaskProgress>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record advisory progress. Clamped to 0..=100.
    pub fn update(&self, percentage: u8, message: impl Into<String>) {
        let mut progress = self.cell.lock().expect("progress cell poisoned");
        *progress = TaskProgress::new(percentage, message);
    }

    /// Force the cell to 100% on successful completion.
    pub fn complete(&self) {
        let mut progress = self.cell.lock().expect("progress cell poisoned");
        progress.percentage = 100;
    }

    pub fn snapshot(&self) -> TaskProgress {
        self.cell.lock().expect("progress cell poisoned").clone()
    }
}

/// Execution context handed to a handler by the scheduler.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub progress: ProgressReporter,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>, progress: ProgressReporter) -> Self {
        Self {
            task_id: task_id.into(),
            progress,
        }
    }
}

/// A pluggable executable unit behind a uniform execute/progress contract.
///
/// A task runs at most once: an `Err` return puts it in the terminal
/// `failed` state with the error message recorded; there are no retries.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Type discriminator this handler serves.
    fn kind(&self) -> &'static str;

    /// Run the task body to completion or failure.
    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_is_shared_between_clones() {
        let reporter = ProgressReporter::new();
        let clone = reporter.clone();
        clone.update(40, "halfway-ish");

        let seen = reporter.snapshot();
        assert_eq!(seen.percentage, 40);
        assert_eq!(seen.message.as_deref(), Some("halfway-ish"));
    }

    #[test]
    fn complete_forces_full_percentage() {
        let reporter = ProgressReporter::new();
        reporter.update(30, "partial");
        reporter.complete();
        assert_eq!(reporter.snapshot().percentage, 100);
    }
}
