//! Domain layer: core models, errors, and capability traits.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{BusError, QueueError};
