//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid concurrency: {0}. Must be between 1 and 64")]
    InvalidConcurrency(usize),

    #[error("Invalid poll_interval_ms: {0}. Must be at least 100")]
    InvalidPollInterval(u64),

    #[error("Broker URL cannot be empty")]
    EmptyBrokerUrl,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .taskmesh/config.yaml (project config)
    /// 3. .taskmesh/local.yaml (project local overrides, optional)
    /// 4. Environment variables (TASKMESH_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.taskmesh/) so several
    /// projects on one machine can run independent agents.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".taskmesh/config.yaml"))
            .merge(Yaml::file(".taskmesh/local.yaml"))
            .merge(Env::prefixed("TASKMESH_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.agent.concurrency == 0 || config.agent.concurrency > 64 {
            return Err(ConfigError::InvalidConcurrency(config.agent.concurrency));
        }

        if config.agent.poll_interval_ms < 100 {
            return Err(ConfigError::InvalidPollInterval(
                config.agent.poll_interval_ms,
            ));
        }

        if config.agent.broker_url.trim().is_empty() {
            return Err(ConfigError::EmptyBrokerUrl);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::BrokerMode;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.agent.concurrency, 1);
        assert_eq!(config.agent.broker_url, "tcp://127.0.0.1:7411");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_parsing() {
        let yaml = r"
agent:
  enabled: true
  broker: external
  broker_url: tcp://bus.internal:1883
  concurrency: 4
  poll_interval_ms: 500
logging:
  level: debug
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.agent.broker, BrokerMode::External);
        assert_eq!(config.agent.broker_url, "tcp://bus.internal:1883");
        assert_eq!(config.agent.concurrency, 4);
        assert_eq!(config.agent.poll_interval_ms, 500);
        assert_eq!(config.logging.level, "debug");

        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn validate_zero_concurrency() {
        let mut config = Config::default();
        config.agent.concurrency = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidConcurrency(0)
        ));
    }

    #[test]
    fn validate_excessive_concurrency() {
        let mut config = Config::default();
        config.agent.concurrency = 65;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidConcurrency(65)
        ));
    }

    #[test]
    fn validate_tight_poll_interval() {
        let mut config = Config::default();
        config.agent.poll_interval_ms = 10;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPollInterval(10)
        ));
    }

    #[test]
    fn validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        let result = ConfigLoader::validate(&config);
        match result.unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "agent:\n  concurrency: 2\nlogging:\n  level: info"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "agent:\n  concurrency: 8").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.agent.concurrency, 8, "override should win");
        assert_eq!(
            config.logging.level, "info",
            "base value should persist when not overridden"
        );
    }
}
