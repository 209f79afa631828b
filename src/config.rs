//! Configuration management for Visit-Session

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Global object in the script runtime that owns the bridge functions
    pub script_namespace: String,

    /// Name of the message handler the host registers for inbound messages
    pub message_handler_name: String,

    /// Snapshot the outgoing visitable before detaching the surface from it
    pub snapshot_on_deactivate: bool,

    /// Log level
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            script_namespace: "webView".to_string(),
            message_handler_name: "turbolinks".to_string(),
            snapshot_on_deactivate: true,
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = SessionConfig::default();

        if let Ok(namespace) = env::var("VISIT_SESSION_SCRIPT_NAMESPACE") {
            config.script_namespace = namespace;
        }

        if let Ok(handler) = env::var("VISIT_SESSION_MESSAGE_HANDLER") {
            config.message_handler_name = handler;
        }

        if let Ok(snapshot) = env::var("VISIT_SESSION_SNAPSHOT_ON_DEACTIVATE") {
            config.snapshot_on_deactivate = snapshot
                .parse()
                .map_err(|_| Error::configuration("Invalid VISIT_SESSION_SNAPSHOT_ON_DEACTIVATE"))?;
        }

        if let Ok(log_level) = env::var("VISIT_SESSION_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let namespace_ok = !self.script_namespace.is_empty()
            && self
                .script_namespace
                .split('.')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));

        if !namespace_ok {
            return Err(Error::configuration(format!(
                "Invalid script namespace: {:?}",
                self.script_namespace
            )));
        }

        if self.message_handler_name.is_empty() {
            return Err(Error::configuration("Message handler name must not be empty"));
        }

        Ok(())
    }
}
