//! Built-in task handler variants.

pub mod docs_update;
pub mod drift;
pub mod llm_chat;
pub mod ping;

pub use docs_update::DocsUpdateHandler;
pub use drift::DriftScanHandler;
pub use llm_chat::LlmChatHandler;
pub use ping::PingHandler;
