//! Configuration management for the voice duet orchestrator
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.*`, then `config/{env}.*`)
//! - Environment variables (`VOICE_DUET__` prefix, `__` separator)
//!
//! Defaults for every field live in [`constants`], so an empty
//! configuration still yields a runnable two-agent conversation.

pub mod agent;
pub mod constants;
pub mod settings;

pub use agent::{AgentProfile, AgentsConfig};
pub use settings::{
    load_settings, load_settings_from, ConversationConfig, ObservabilityConfig, RealtimeConfig,
    RuntimeEnvironment, ServerConfig, SessionSettings, Settings, TurnDetectionMode,
    TurnDetectionSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => ConfigError::FileNotFound(path),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
