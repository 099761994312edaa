//! Handler registry.
//!
//! Maps task `type` discriminators to factory closures. Adding a handler
//! variant is one `register` call; the scheduler never learns variant
//! internals. Unknown types are skipped by callers (forward
//! compatibility: an agent running older code must not crash on a newer
//! task type).

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::config::Config;
use crate::domain::models::task::TaskMessage;
use crate::domain::ports::handler::TaskHandler;
use crate::services::handlers::{
    DocsUpdateHandler, DriftScanHandler, LlmChatHandler, PingHandler,
};

type HandlerFactory = Box<dyn Fn(&TaskMessage) -> Arc<dyn TaskHandler> + Send + Sync>;

/// Registry of handler factories keyed by task type.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler variant wired up.
    pub fn with_builtin_handlers(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register("ping", |_| Arc::new(PingHandler::new()));
        registry.register("docs-update", |_| Arc::new(DocsUpdateHandler::new()));
        registry.register("drift-scan", |_| Arc::new(DriftScanHandler::new()));

        let llm = config.llm.clone();
        registry.register("llm-chat", move |message| {
            Arc::new(LlmChatHandler::from_message(message, llm.clone()))
        });
        registry
    }

    /// Register a factory for one task type.
    pub fn register(
        &mut self,
        kind: &str,
        factory: impl Fn(&TaskMessage) -> Arc<dyn TaskHandler> + Send + Sync + 'static,
    ) {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// Instantiate the handler for a task message, or `None` when the
    /// type is unknown.
    pub fn build(&self, message: &TaskMessage) -> Option<Arc<dyn TaskHandler>> {
        self.factories
            .get(&message.kind)
            .map(|factory| factory(message))
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_every_variant() {
        let registry = HandlerRegistry::with_builtin_handlers(&Config::default());
        for kind in ["ping", "docs-update", "drift-scan", "llm-chat"] {
            assert!(registry.is_registered(kind), "missing {kind}");
        }
    }

    #[test]
    fn unknown_kind_builds_nothing() {
        let registry = HandlerRegistry::with_builtin_handlers(&Config::default());
        let message = TaskMessage::new("quantum-flux", None);
        assert!(registry.build(&message).is_none());
    }

    #[test]
    fn built_handler_reports_its_kind() {
        let registry = HandlerRegistry::with_builtin_handlers(&Config::default());
        let message = TaskMessage::new("ping", None);
        let handler = registry.build(&message).unwrap();
        assert_eq!(handler.kind(), "ping");
    }
}
