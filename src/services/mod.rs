//! Application services: scheduling, supervision, and the handler registry.

pub mod handlers;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;

pub use lifecycle::LifecycleSupervisor;
pub use registry::HandlerRegistry;
pub use scheduler::{TaskScheduler, TaskSnapshot};
