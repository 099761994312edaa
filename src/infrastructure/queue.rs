//! Durable local task queue.
//!
//! A JSON array of task records at a project-local path, independent of the
//! message bus. It is the audit trail for every locally submitted task and
//! the source for poll-fed discovery when no bus is available. Records are
//! never pruned automatically.
//!
//! The file is not protected by cross-process locking: the design assumes
//! at most one local agent process per project (enforced softly via the
//! agent lock file) and treats the bus, not this file, as the multi-agent
//! coordination point.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::domain::error::QueueError;
use crate::domain::models::task::{TaskMessage, TaskRecord, TaskStatus};

/// Project-local directory for agent runtime state.
pub const AGENT_DIR: &str = ".taskmesh/agent";

/// Queue file name inside [`AGENT_DIR`].
const TASKS_FILE: &str = "tasks.json";

/// File-backed record of every task ever submitted locally.
#[derive(Debug, Clone)]
pub struct PersistentQueue {
    path: PathBuf,
}

impl PersistentQueue {
    /// Queue at an explicit file path (tests point this at a temp dir).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Queue at the conventional project-local path.
    pub fn project_local() -> Self {
        Self::new(Path::new(AGENT_DIR).join(TASKS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a pending record with a generated `<type>-<epoch-millis>` id
    /// and rewrite the queue file. Returns the new task's id.
    pub fn enqueue(
        &self,
        kind: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<String, QueueError> {
        let mut records = self.load();
        let message = TaskMessage::new(kind, payload);
        let id = message.id.clone();
        records.push(TaskRecord::from(&message));
        self.save(&records)?;
        Ok(id)
    }

    /// Read every record. A missing or unparsable file is an empty queue,
    /// never an error.
    pub fn load(&self) -> Vec<TaskRecord> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "queue file unparsable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the status of the record with `id`. Unknown ids are a no-op.
    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<(), QueueError> {
        let mut records = self.load();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(());
        };
        record.status = status;
        self.save(&records)
    }

    /// Rewrite the whole file through a temp file + rename so readers never
    /// observe a partial write.
    fn save(&self, records: &[TaskRecord]) -> Result<(), QueueError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| QueueError::Write {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let contents = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|source| QueueError::Write {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| QueueError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue_in(dir: &TempDir) -> PersistentQueue {
        PersistentQueue::new(dir.path().join("agent").join("tasks.json"))
    }

    #[test]
    fn enqueue_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        let id = queue
            .enqueue("ping", Some(serde_json::json!({"note": "hello"})))
            .unwrap();

        let records = queue.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].kind, "ping");
        assert_eq!(records[0].status, TaskStatus::Pending);
        assert_eq!(records[0].payload.as_ref().unwrap()["note"], "hello");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(queue_in(&dir).load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        fs::create_dir_all(queue.path().parent().unwrap()).unwrap();
        fs::write(queue.path(), "{not json[").unwrap();

        assert!(queue.load().is_empty());
    }

    #[test]
    fn update_status_replaces_only_the_matching_record() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        let first = queue.enqueue("ping", None).unwrap();
        let second = queue.enqueue("drift-scan", None).unwrap();

        queue.update_status(&first, TaskStatus::Completed).unwrap();

        let records = queue.load();
        let lookup = |id: &str| records.iter().find(|r| r.id == id).unwrap().status;
        assert_eq!(lookup(&first), TaskStatus::Completed);
        assert_eq!(lookup(&second), TaskStatus::Pending);
    }

    #[test]
    fn update_status_for_unknown_id_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.enqueue("ping", None).unwrap();

        queue.update_status("ghost-1", TaskStatus::Failed).unwrap();
        assert_eq!(queue.load().len(), 1);
    }
}
