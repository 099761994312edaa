//! Task domain model.
//!
//! A task is a discrete unit of background work identified by a string id
//! and dispatched to a handler variant selected by its `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, not yet admitted by the scheduler
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Execution returned an error
    Failed,
    /// Reserved for a future cancellation API; never produced today
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status. The machine is strictly forward:
    /// `pending -> running -> {completed | failed}`, with `cancelled`
    /// reachable from any non-terminal state.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Cancelled],
            Self::Running => vec![Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory progress reported by a running handler.
///
/// `percentage` is clamped to 0..=100 by convention; it is handler-owned
/// and not validated by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskProgress {
    pub fn new(percentage: u8, message: impl Into<String>) -> Self {
        Self {
            percentage: percentage.min(100),
            message: Some(message.into()),
        }
    }

    pub fn done() -> Self {
        Self {
            percentage: 100,
            message: None,
        }
    }
}

/// Wire representation of a task on the request channel, and the identity
/// half of the scheduler's in-memory task entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskMessage {
    /// Build a fresh pending task with a locally generated id of the form
    /// `<type>-<epoch-millis>`.
    pub fn new(kind: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        let kind = kind.into();
        let now = Utc::now();
        Self {
            id: format!("{}-{}", kind, now.timestamp_millis()),
            kind,
            payload,
            status: TaskStatus::Pending,
            created_at: now,
        }
    }
}

/// Durable projection of a task persisted in the local queue file.
///
/// Progress and error are in-memory / bus-only and deliberately absent here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&TaskMessage> for TaskRecord {
    fn from(msg: &TaskMessage) -> Self {
        Self {
            id: msg.id.clone(),
            kind: msg.kind.clone(),
            payload: msg.payload.clone(),
            status: msg.status,
            created_at: msg.created_at,
        }
    }
}

impl From<&TaskRecord> for TaskMessage {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind.clone(),
            payload: record.payload.clone(),
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// Status update published on the per-task status channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(
        task_id: impl Into<String>,
        status: TaskStatus,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            payload,
            updated_at: Utc::now(),
        }
    }
}
