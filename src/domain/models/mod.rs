//! Domain models.

pub mod config;
pub mod task;

pub use config::{AgentConfig, BrokerMode, Config, LlmConfig, LoggingConfig, ServicesConfig};
pub use task::{StatusUpdate, TaskMessage, TaskProgress, TaskRecord, TaskStatus};
