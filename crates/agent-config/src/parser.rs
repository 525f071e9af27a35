//! Configuration parser with environment variable substitution

use crate::{
    resolver::{resolve_document, ResolutionContext},
    AgentFile, ConfigError, Result,
};
use registration_agent::AgentConfig;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Parse a YAML configuration file against the process environment
pub fn parse_file(path: impl AsRef<Path>) -> Result<AgentConfig> {
    let path = path.as_ref();
    debug!("Loading agent configuration from {:?}", path);
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string against the process environment
pub fn parse_str(content: &str) -> Result<AgentConfig> {
    parse_str_with(content, &ResolutionContext::new())
}

/// Parse YAML configuration from a string with an explicit resolution context
pub fn parse_str_with(content: &str, context: &ResolutionContext) -> Result<AgentConfig> {
    parse_document(content, context)?.into_agent_config()
}

/// Parse YAML into the raw file model without validating it
pub fn parse_document(content: &str, context: &ResolutionContext) -> Result<AgentFile> {
    let resolved = resolve_document(content, context)?;
    Ok(serde_yaml::from_str(&resolved)?)
}

/// Parse `500ms`, `10s`, `2m`, `1h` or a bare number of seconds
pub fn parse_duration(input: &str) -> Result<Duration> {
    let text = input.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("Invalid duration: '{}'", input)))?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        other => {
            return Err(ConfigError::ValidationError(format!(
                "Invalid duration unit '{}' in '{}', expected ms, s, m or h",
                other, input
            )));
        }
    };

    Ok(duration)
}
