//! Subcommand implementations.

pub mod agent;
pub mod task;
pub mod tools;
