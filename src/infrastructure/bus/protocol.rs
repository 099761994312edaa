//! Bus wire protocol.
//!
//! Newline-delimited JSON frames over TCP. The bus is a capability the core
//! consumes, not an MQTT implementation; the frame set is the minimum a
//! task agent needs: hello, subscribe (with optional competing-consumer
//! group), retained publish, and message delivery.

use serde::{Deserialize, Serialize};

/// Channel every task request is published on.
pub const TASK_REQUEST_CHANNEL: &str = "taskmesh/tasks/request";

/// Prefix of the per-task status channels.
pub const STATUS_CHANNEL_PREFIX: &str = "taskmesh/tasks/status";

/// Consumer group agents join for load-shared work distribution.
pub const SHARED_GROUP: &str = "taskmesh-workers";

/// Status channel for one task id.
pub fn status_channel(task_id: &str) -> String {
    format!("{STATUS_CHANNEL_PREFIX}/{task_id}")
}

/// A single protocol frame, one per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    /// Client session introduction; the identity is fresh per connection.
    Hello { client_id: String },

    /// Subscribe to a channel pattern. With `group`, the broker delivers
    /// each matching message to exactly one member of that group.
    Subscribe {
        channel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },

    /// Publish a message. `retain` keeps the last message on the channel
    /// for replay to late subscribers.
    Publish {
        channel: String,
        body: serde_json::Value,
        #[serde(default)]
        retain: bool,
    },

    /// Broker-to-client delivery.
    Message {
        channel: String,
        body: serde_json::Value,
    },
}

/// Match a concrete channel against a subscription pattern.
///
/// Patterns are exact channel names, optionally ending in a `#` multi-level
/// wildcard segment (`taskmesh/tasks/status/#`).
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("#") {
        let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
        channel == prefix || channel.starts_with(&format!("{prefix}/"))
    } else {
        pattern == channel
    }
}
