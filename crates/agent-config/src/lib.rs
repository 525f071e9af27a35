//! # Agent Configuration
//!
//! YAML configuration loader for the registration agent.
//!
//! This crate reads an agent configuration file, substitutes `${VAR}` and
//! `${VAR:-default}` references from the environment, and converts the result
//! into a validated [`registration_agent::AgentConfig`].

#![warn(missing_docs)]

use registration_agent::AgentConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod parser;
pub mod resolver;

pub use parser::{parse_file, parse_str, parse_str_with};
pub use resolver::ResolutionContext;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

impl From<registration_agent::Error> for ConfigError {
    fn from(err: registration_agent::Error) -> Self {
        match err {
            registration_agent::Error::Config(msg) => ConfigError::ValidationError(msg),
            other => ConfigError::ValidationError(other.to_string()),
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of the agent configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentFile {
    /// The application being advertised
    pub application: Application,

    /// Management endpoint advertised to the registry
    pub management: Management,

    /// Registry connection settings
    pub registry: Registry,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Application {
    /// Application name, used as alias and default realm prefix
    pub name: String,

    /// Port of the application's HTTP listener
    pub http_port: u16,
}

/// Management endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Management {
    /// Host advertised in the connect URL
    pub host: String,

    /// Port advertised in the connect URL
    pub port: u16,

    /// Environment variable overriding the port at runtime; empty disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_override_env: Option<String>,
}

/// Registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Registry {
    /// Registry base URL
    pub url: String,

    /// Authorization header value
    pub authorization: String,

    /// Host the registry calls back on
    pub callback_host: String,

    /// Path of the discovery callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_path: Option<String>,

    /// Period between registration attempts
    pub retry_interval: DurationSpec,

    /// Per-request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<DurationSpec>,

    /// Prefix of realms and node names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_prefix: Option<String>,
}

/// A duration written either as whole seconds or as `500ms`, `10s`, `2m`, `1h`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    /// Whole seconds
    Seconds(u64),
    /// Number with a unit suffix
    Text(String),
}

impl DurationSpec {
    /// Convert to a [`Duration`]
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            DurationSpec::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationSpec::Text(text) => parser::parse_duration(text),
        }
    }
}

impl AgentFile {
    /// Validate and convert into the agent's runtime configuration
    pub fn into_agent_config(self) -> Result<AgentConfig> {
        let AgentFile {
            application,
            management,
            registry,
        } = self;

        let mut builder = AgentConfig::builder()
            .with_app_name(application.name)
            .with_http_port(application.http_port)
            .with_management(management.host, management.port)
            .with_registry_url(registry.url)
            .with_authorization(registry.authorization)
            .with_callback_host(registry.callback_host)
            .with_retry_interval(registry.retry_interval.to_duration()?);

        if let Some(name) = management.port_override_env {
            builder = builder.with_port_override_env(Some(name));
        }
        if let Some(path) = registry.callback_path {
            builder = builder.with_callback_path(path);
        }
        if let Some(timeout) = registry.request_timeout {
            builder = builder.with_request_timeout(timeout.to_duration()?);
        }
        if let Some(prefix) = registry.realm_prefix {
            builder = builder.with_realm_prefix(prefix);
        }

        Ok(builder.build()?)
    }
}
