//! Minimal chat-completion client.
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. This is one
//! interchangeable task-handler dependency, not a core concern: only the
//! `llm-chat` handler uses it.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::models::config::LlmConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for the configured chat-completion endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// Build a client from config. Fails when no endpoint or model is
    /// configured; the API key is read from the configured environment
    /// variable and may legitimately be absent for local endpoints.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .context("llm.api_base is not configured")?;
        let model = config
            .model
            .clone()
            .context("llm.model is not configured")?;
        let api_key = std::env::var(&config.api_key_env).ok();

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base,
            model,
            api_key,
        })
    }

    /// Run one completion and return the assistant's reply text.
    pub async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&ChatRequest {
            model: self.model.clone(),
            messages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("chat completion request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to decode chat completion response")?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .context("chat completion response had no choices")?;
        Ok(reply.message.content)
    }
}
