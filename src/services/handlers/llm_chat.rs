//! LLM chat handler.
//!
//! Sends the payload's prompt to the configured chat-completion endpoint
//! and logs the reply. Fails the task when no endpoint is configured.

use async_trait::async_trait;
use tracing::info;

use crate::domain::models::config::LlmConfig;
use crate::domain::models::task::TaskMessage;
use crate::domain::ports::handler::{TaskContext, TaskHandler};
use crate::infrastructure::llm::ChatClient;

pub struct LlmChatHandler {
    prompt: String,
    system: Option<String>,
    config: LlmConfig,
}

impl LlmChatHandler {
    pub fn new(prompt: impl Into<String>, system: Option<String>, config: LlmConfig) -> Self {
        Self {
            prompt: prompt.into(),
            system,
            config,
        }
    }

    /// Build from a task message payload of the form
    /// `{"prompt": "...", "system": "..."}`.
    pub fn from_message(message: &TaskMessage, config: LlmConfig) -> Self {
        let prompt = message
            .payload
            .as_ref()
            .and_then(|p| p.get("prompt"))
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string();
        let system = message
            .payload
            .as_ref()
            .and_then(|p| p.get("system"))
            .and_then(|s| s.as_str())
            .map(String::from);
        Self::new(prompt, system, config)
    }
}

#[async_trait]
impl TaskHandler for LlmChatHandler {
    fn kind(&self) -> &'static str {
        "llm-chat"
    }

    async fn execute(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        anyhow::ensure!(!self.prompt.is_empty(), "llm-chat payload has no prompt");

        ctx.progress.update(10, "Contacting model...");
        let client = ChatClient::from_config(&self.config)?;
        let reply = client
            .complete(&self.prompt, self.system.as_deref())
            .await?;

        info!(task_id = %ctx.task_id, reply = %reply, "chat completion finished");
        ctx.progress.update(100, "Completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::handler::ProgressReporter;

    #[tokio::test]
    async fn fails_without_llm_configuration() {
        let message = TaskMessage::new("llm-chat", Some(serde_json::json!({"prompt": "hello"})));
        let handler = LlmChatHandler::from_message(&message, LlmConfig::default());
        let ctx = TaskContext::new(&message.id, ProgressReporter::new());

        let err = handler.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("api_base"));
    }

    #[tokio::test]
    async fn fails_on_empty_prompt() {
        let message = TaskMessage::new("llm-chat", None);
        let handler = LlmChatHandler::from_message(&message, LlmConfig::default());
        let ctx = TaskContext::new(&message.id, ProgressReporter::new());

        let err = handler.execute(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("no prompt"));
    }
}
