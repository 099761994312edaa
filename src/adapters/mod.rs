//! Inbound adapters exposing the agent to external clients.

pub mod tools_stdio;

pub use tools_stdio::ToolServer;
