//! Task scheduler.
//!
//! Bounded-concurrency execution engine with a strict per-task state
//! machine. All bookkeeping is mutated inside short lock-free-of-await
//! critical sections; admission is re-evaluated once per completion
//! event, never from an idle polling loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::models::task::{TaskMessage, TaskProgress, TaskStatus};
use crate::domain::ports::handler::{ProgressReporter, TaskContext, TaskHandler};
use crate::domain::ports::status::StatusPublisher;
use crate::infrastructure::queue::PersistentQueue;
use crate::services::registry::HandlerRegistry;

/// Read-only view of one tracked task, for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct TaskEntry {
    message: TaskMessage,
    status: TaskStatus,
    progress: ProgressReporter,
    error: Option<String>,
    handler: Arc<dyn TaskHandler>,
}

impl TaskEntry {
    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.message.id.clone(),
            kind: self.message.kind.clone(),
            status: self.status,
            progress: self.progress.snapshot(),
            error: self.error.clone(),
            created_at: self.message.created_at,
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Insertion order is admission order; no priorities.
    tasks: Vec<TaskEntry>,
    active: usize,
}

/// Bounded-concurrency scheduler owning the in-memory task set.
///
/// Explicitly constructed and passed around; independent instances can
/// run in parallel (tests rely on this).
pub struct TaskScheduler {
    inner: Mutex<Inner>,
    max_concurrency: usize,
    queue: Option<PersistentQueue>,
    publisher: Option<Arc<dyn StatusPublisher>>,
}

impl TaskScheduler {
    pub fn new(
        max_concurrency: usize,
        queue: Option<PersistentQueue>,
        publisher: Option<Arc<dyn StatusPublisher>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            max_concurrency: max_concurrency.max(1),
            queue,
            publisher,
        })
    }

    /// Register a handler instance for a task and attempt admission.
    ///
    /// Duplicate ids are ignored and return `false`, which makes bus
    /// redelivery idempotent. A registered task always enters as
    /// `pending` and never re-enters `pending` once scheduled.
    pub fn add_task(self: &Arc<Self>, handler: Arc<dyn TaskHandler>, message: TaskMessage) -> bool {
        {
            let mut inner = self.inner.lock().expect("scheduler state poisoned");
            if inner.tasks.iter().any(|t| t.message.id == message.id) {
                debug!(task_id = %message.id, "task already tracked, ignoring redelivery");
                return false;
            }
            info!(task_id = %message.id, kind = %message.kind, "task registered");
            inner.tasks.push(TaskEntry {
                message,
                status: TaskStatus::Pending,
                progress: ProgressReporter::new(),
                error: None,
                handler,
            });
        }
        self.schedule();
        true
    }

    /// Instantiate the right handler variant for `message` via the
    /// registry and register it. Unknown types are skipped silently
    /// (forward compatibility), duplicates are ignored.
    pub fn ingest(self: &Arc<Self>, registry: &HandlerRegistry, message: TaskMessage) -> bool {
        if self.is_tracked(&message.id) {
            debug!(task_id = %message.id, "redelivered task already tracked");
            return false;
        }
        match registry.build(&message) {
            Some(handler) => self.add_task(handler, message),
            None => {
                debug!(kind = %message.kind, task_id = %message.id, "skipping task of unknown type");
                false
            }
        }
    }

    /// Poll-fed discovery: re-read the durable queue on a fixed interval
    /// and ingest every pending record not yet tracked. This is the
    /// fallback feeder for installations without a message bus.
    pub fn spawn_poller(
        self: &Arc<Self>,
        queue: PersistentQueue,
        registry: Arc<HandlerRegistry>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for record in queue.load() {
                    if record.status != TaskStatus::Pending {
                        continue;
                    }
                    scheduler.ingest(&registry, TaskMessage::from(&record));
                }
            }
        })
    }

    /// One admission pass: promote the first pending task (insertion
    /// order) iff the active count is below the ceiling. Called after
    /// every registration and after every completion.
    fn schedule(self: &Arc<Self>) {
        let admitted = {
            let mut inner = self.inner.lock().expect("scheduler state poisoned");
            if inner.active >= self.max_concurrency {
                None
            } else if let Some(entry) = inner
                .tasks
                .iter_mut()
                .find(|t| t.status == TaskStatus::Pending)
            {
                entry.status = TaskStatus::Running;
                let job = (
                    entry.message.id.clone(),
                    Arc::clone(&entry.handler),
                    entry.progress.clone(),
                );
                inner.active += 1;
                Some(job)
            } else {
                None
            }
        };

        if let Some((task_id, handler, progress)) = admitted {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.run_task(task_id, handler, progress).await;
            });
        }
    }

    async fn run_task(
        self: Arc<Self>,
        task_id: String,
        handler: Arc<dyn TaskHandler>,
        progress: ProgressReporter,
    ) {
        info!(task_id = %task_id, "task running");
        self.record_transition(&task_id, TaskStatus::Running, None)
            .await;

        let ctx = TaskContext::new(&task_id, progress.clone());
        let result = handler.execute(&ctx).await;

        let (status, task_error) = match result {
            Ok(()) => {
                progress.complete();
                info!(task_id = %task_id, "task completed");
                (TaskStatus::Completed, None)
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(task_id = %task_id, error = %message, "task failed");
                (TaskStatus::Failed, Some(message))
            }
        };

        // Terminal bookkeeping and the active-count decrement happen
        // unconditionally, whatever the handler returned.
        {
            let mut inner = self.inner.lock().expect("scheduler state poisoned");
            if let Some(entry) = inner.tasks.iter_mut().find(|t| t.message.id == task_id) {
                entry.status = status;
                entry.error = task_error.clone();
            }
            inner.active -= 1;
        }

        let payload = task_error.map(|e| serde_json::json!({ "error": e }));
        self.record_transition(&task_id, status, payload).await;
        self.schedule();
    }

    /// Persist the transition to the durable queue and best-effort
    /// publish it on the status channel. Publish failures are an
    /// observability outage, never a task failure.
    async fn record_transition(
        &self,
        task_id: &str,
        status: TaskStatus,
        payload: Option<serde_json::Value>,
    ) {
        if let Some(queue) = &self.queue {
            if let Err(err) = queue.update_status(task_id, status) {
                error!(task_id, error = %err, "failed to persist task status");
            }
        }
        if let Some(publisher) = &self.publisher {
            if let Err(err) = publisher.publish_status(task_id, status, payload).await {
                warn!(task_id, error = %err, "status publish failed, continuing");
            }
        }
    }

    pub fn is_tracked(&self, task_id: &str) -> bool {
        self.inner
            .lock()
            .expect("scheduler state poisoned")
            .tasks
            .iter()
            .any(|t| t.message.id == task_id)
    }

    pub fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.inner
            .lock()
            .expect("scheduler state poisoned")
            .tasks
            .iter()
            .find(|t| t.message.id == task_id)
            .map(TaskEntry::snapshot)
    }

    /// Every task currently tracked in memory, in insertion order.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.inner
            .lock()
            .expect("scheduler state poisoned")
            .tasks
            .iter()
            .map(TaskEntry::snapshot)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().expect("scheduler state poisoned").active
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SleepHandler {
        millis: u64,
    }

    #[async_trait]
    impl TaskHandler for SleepHandler {
        fn kind(&self) -> &'static str {
            "sleep"
        }

        async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl TaskHandler for FailingHandler {
        fn kind(&self) -> &'static str {
            "boom"
        }

        async fn execute(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            anyhow::bail!("deliberate failure")
        }
    }

    fn message(kind: &str, id: &str) -> TaskMessage {
        let mut msg = TaskMessage::new(kind, None);
        msg.id = id.to_string();
        msg
    }

    #[tokio::test]
    async fn duplicate_ids_schedule_once() {
        let scheduler = TaskScheduler::new(2, None, None);
        assert!(scheduler.add_task(Arc::new(SleepHandler { millis: 20 }), message("sleep", "t-1")));
        assert!(!scheduler.add_task(Arc::new(SleepHandler { millis: 20 }), message("sleep", "t-1")));
        assert_eq!(scheduler.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn failed_handler_records_error() {
        let scheduler = TaskScheduler::new(1, None, None);
        scheduler.add_task(Arc::new(FailingHandler), message("boom", "b-1"));

        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = scheduler.snapshot("b-1").unwrap();
        assert_eq!(snap.status, TaskStatus::Failed);
        assert!(snap.error.as_deref().unwrap().contains("deliberate failure"));
    }

    #[tokio::test]
    async fn completed_handler_forces_full_progress() {
        let scheduler = TaskScheduler::new(1, None, None);
        scheduler.add_task(Arc::new(SleepHandler { millis: 5 }), message("sleep", "s-1"));

        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = scheduler.snapshot("s-1").unwrap();
        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.progress.percentage, 100);
    }

    #[tokio::test]
    async fn unknown_type_is_skipped_by_ingest() {
        let scheduler = TaskScheduler::new(1, None, None);
        let registry = HandlerRegistry::new();
        assert!(!scheduler.ingest(&registry, message("novel-kind", "n-1")));
        assert!(scheduler.snapshots().is_empty());
    }
}
