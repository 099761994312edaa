//! Crate-wide error taxonomy.
//!
//! Bus errors on the task-submission path are surfaced to the caller so a
//! local enqueue can degrade to queue-only; status-channel failures are
//! swallowed by the scheduler. Queue write failures propagate.

use thiserror::Error;

/// Errors raised by the message bus (embedded broker or client).
#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to bind broker listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to broker at {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to broker at {target}")]
    ConnectTimeout { target: String },

    #[error("bus client is not connected")]
    NotConnected,

    #[error("bus connection closed")]
    Closed,

    #[error("failed to encode bus frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("bus i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the durable local task queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to write queue file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize queue contents: {0}")]
    Serialize(#[from] serde_json::Error),
}
