//! Environment variable resolver
//!
//! Handles `${VAR}` and `${VAR:-default}` references in configuration text.

use crate::{ConfigError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("variable pattern is valid"));

/// Context for resolving variables
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// Environment variables (can be overridden)
    pub env_vars: HashMap<String, String>,
}

impl ResolutionContext {
    /// Create a context from the process environment
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Create a context that sees no variables at all
    pub fn empty() -> Self {
        Self {
            env_vars: HashMap::new(),
        }
    }

    /// Add or update an environment variable
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }

    /// Builder-style [`set_env`](Self::set_env)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env(key, value);
        self
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve all variables in a string
///
/// Every unresolvable name is reported at once.
pub fn resolve_string(input: &str, context: &ResolutionContext) -> Result<String> {
    let mut errors = Vec::new();

    let resolved = VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        let var_expr = &cap[1];

        // Handle default values: ${VAR:-default}
        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        match (context.env_vars.get(var_name), default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                errors.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !errors.is_empty() {
        return Err(ConfigError::EnvVarNotFound(errors.join(", ")));
    }

    Ok(resolved.into_owned())
}

/// Resolve variables in configuration text, leaving comment lines untouched
pub fn resolve_document(content: &str, context: &ResolutionContext) -> Result<String> {
    let mut resolved = String::with_capacity(content.len());
    let mut missing = Vec::new();

    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            resolved.push_str(line);
            continue;
        }
        match resolve_string(line, context) {
            Ok(value) => resolved.push_str(&value),
            Err(ConfigError::EnvVarNotFound(names)) => missing.push(names),
            Err(e) => return Err(e),
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(resolved)
}
