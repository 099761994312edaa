//! Capability traits at the domain boundary.

pub mod handler;
pub mod launcher;
pub mod status;
pub mod supervision;

pub use handler::{ProgressReporter, TaskContext, TaskHandler};
pub use launcher::{OsProcessLauncher, ProcessLauncher};
pub use status::StatusPublisher;
pub use supervision::{NoSupervision, Supervision};
