//! Status publication capability.
//!
//! The scheduler reports status transitions through this trait; the bus
//! implements it. Failures here are observability-channel failures and
//! must never block task execution — callers swallow and log them.

use async_trait::async_trait;

use crate::domain::error::BusError;
use crate::domain::models::task::TaskStatus;

#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        payload: Option<serde_json::Value>,
    ) -> Result<(), BusError>;
}
