//! Infrastructure layer: message bus, durable queue, configuration
//! loading, and external integrations.

pub mod bus;
pub mod config;
pub mod llm;
pub mod queue;

pub use bus::MessageBus;
pub use config::{ConfigError, ConfigLoader};
pub use queue::PersistentQueue;
