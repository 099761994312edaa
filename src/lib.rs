//! Taskmesh - Distributed Background-Task Agent
//!
//! Taskmesh runs long-lived background tasks for a project: submission
//! goes through a durable local queue and a lightweight pub/sub message
//! bus, execution happens in per-project agent processes with bounded
//! concurrency, and a stdio tool server exposes the same operations to
//! LLM clients.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Task model, configuration, and ports
//! - **Service Layer** (`services`): Scheduling, supervision, handler registry
//! - **Infrastructure Layer** (`infrastructure`): Bus, durable queue, config, HTTP
//! - **Adapters Layer** (`adapters`): Stdio tool server
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use taskmesh::infrastructure::queue::PersistentQueue;
//!
//! fn main() -> anyhow::Result<()> {
//!     let queue = PersistentQueue::project_local();
//!     let task_id = queue.enqueue("ping", None)?;
//!     println!("submitted {task_id}");
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::error::{BusError, QueueError};
pub use domain::models::{
    AgentConfig, BrokerMode, Config, LlmConfig, LoggingConfig, StatusUpdate, TaskMessage,
    TaskProgress, TaskRecord, TaskStatus,
};
pub use domain::ports::{
    ProcessLauncher, ProgressReporter, StatusPublisher, Supervision, TaskContext, TaskHandler,
};
pub use infrastructure::bus::MessageBus;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::queue::PersistentQueue;
pub use services::{HandlerRegistry, LifecycleSupervisor, TaskScheduler, TaskSnapshot};
