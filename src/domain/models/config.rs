//! Configuration model.
//!
//! The core reads this object but never persists it; loading and merging
//! happens in `infrastructure::config`.

use serde::{Deserialize, Serialize};

/// Main configuration structure for Taskmesh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Agent subsystem configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chat-completion endpoint used by the `llm-chat` handler
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// How the message broker is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerMode {
    /// Taskmesh hosts the broker itself (`taskmesh agent broker`)
    Internal,
    /// An externally managed broker is reachable at `broker_url`
    External,
}

impl Default for BrokerMode {
    fn default() -> Self {
        Self::Internal
    }
}

/// Agent subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Master switch for the whole agent subsystem
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Broker ownership mode
    #[serde(default)]
    pub broker: BrokerMode,

    /// Broker address, `tcp://host:port`
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Concurrency ceiling for the scheduler (1-64)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Poll-fed discovery interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// When true, agents join the shared consumer group and split the
    /// task stream; when false every subscriber sees every task
    #[serde(default = "default_enabled")]
    pub shared_group: bool,

    /// Optional per-service toggles
    #[serde(default)]
    pub services: ServicesConfig,
}

const fn default_enabled() -> bool {
    true
}

fn default_broker_url() -> String {
    "tcp://127.0.0.1:7411".to_string()
}

const fn default_concurrency() -> usize {
    1
}

const fn default_poll_interval_ms() -> u64 {
    3000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            broker: BrokerMode::default(),
            broker_url: default_broker_url(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            shared_group: default_enabled(),
            services: ServicesConfig::default(),
        }
    }
}

/// Per-service toggles inside a running agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServicesConfig {
    /// Stdio tool server alongside the worker loop
    #[serde(default = "default_enabled")]
    pub tools: bool,

    /// Poll-fed task discovery (durable queue re-reads)
    #[serde(default = "default_enabled")]
    pub polling: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            tools: default_enabled(),
            polling: default_enabled(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level filter: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Chat-completion endpoint configuration.
///
/// All fields optional; the `llm-chat` handler fails its task when the
/// endpoint is not configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default)]
    pub api_base: Option<String>,

    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "TASKMESH_LLM_API_KEY".to_string()
}

impl AgentConfig {
    /// Port component of `broker_url`, falling back to the default port
    /// when the URL carries none.
    pub fn broker_port(&self) -> u16 {
        parse_port(&self.broker_url).unwrap_or(7411)
    }

    /// Host component of `broker_url`.
    pub fn broker_host(&self) -> String {
        parse_host(&self.broker_url).unwrap_or_else(|| "127.0.0.1".to_string())
    }
}

fn strip_scheme(url: &str) -> &str {
    url.trim()
        .split_once("://")
        .map_or_else(|| url.trim(), |(_, rest)| rest)
}

fn parse_port(url: &str) -> Option<u16> {
    strip_scheme(url).rsplit_once(':')?.1.parse().ok()
}

fn parse_host(url: &str) -> Option<String> {
    let rest = strip_scheme(url);
    let host = rest.rsplit_once(':').map_or(rest, |(h, _)| h);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.agent.enabled);
        assert_eq!(config.agent.broker, BrokerMode::Internal);
        assert_eq!(config.agent.concurrency, 1);
        assert_eq!(config.agent.poll_interval_ms, 3000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("broker_url"));

        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.agent.broker_url, "tcp://127.0.0.1:7411");
        assert_eq!(parsed.agent.concurrency, 1);
        assert!(parsed.agent.shared_group);
    }

    #[test]
    fn broker_url_parsing() {
        let mut agent = AgentConfig::default();
        assert_eq!(agent.broker_port(), 7411);
        assert_eq!(agent.broker_host(), "127.0.0.1");

        agent.broker_url = "tcp://bus.internal:1883".to_string();
        assert_eq!(agent.broker_port(), 1883);
        assert_eq!(agent.broker_host(), "bus.internal");

        agent.broker_url = "localhost:9000".to_string();
        assert_eq!(agent.broker_port(), 9000);
        assert_eq!(agent.broker_host(), "localhost");

        // no port falls back to the default
        agent.broker_url = "tcp://localhost".to_string();
        assert_eq!(agent.broker_port(), 7411);
    }
}
