//! Agent configuration
//!
//! [`AgentConfig`] is the immutable set of values the controller needs to
//! build registration requests and discovery descriptors. It is produced once
//! at startup through [`AgentConfigBuilder`], which rejects missing or invalid
//! values up front so nothing fails later at use time.

use crate::error::{Error, Result};
use reqwest::Url;
use std::borrow::Cow;
use std::net::Ipv6Addr;
use std::time::Duration;

/// Default path of the discovery callback served by the application
pub const DEFAULT_CALLBACK_PATH: &str = "/cryostat-discovery";

/// Default environment variable consulted for the management port override
pub const DEFAULT_PORT_OVERRIDE_ENV: &str = "JMXREMOTE_PORT";

/// Default per-request timeout for registry calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved, validated agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    app_name: String,
    http_port: u16,
    management_host: String,
    management_port: u16,
    port_override_env: Option<String>,
    registry_url: Url,
    authorization: String,
    callback_host: String,
    callback_path: String,
    retry_interval: Duration,
    request_timeout: Duration,
    realm_prefix: String,
}

impl AgentConfig {
    /// Create a new configuration builder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Application name, advertised as the target alias
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Port of the application's own HTTP listener
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Host advertised in the management connect URL
    pub fn management_host(&self) -> &str {
        &self.management_host
    }

    /// Base URL of the discovery registry
    pub fn registry_url(&self) -> &Url {
        &self.registry_url
    }

    /// Credential sent on every registry call
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Hostname the registry uses to call back into this agent
    pub fn callback_host(&self) -> &str {
        &self.callback_host
    }

    /// Period between registration attempts while unregistered
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Per-request timeout applied by the transport
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Prefix used for realms and advertised node names
    pub fn realm_prefix(&self) -> &str {
        &self.realm_prefix
    }

    /// Environment variable that may override the management port
    pub fn port_override_env(&self) -> Option<&str> {
        self.port_override_env.as_deref()
    }

    /// URL the registry calls back on
    pub fn callback_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            url_host(&self.callback_host),
            self.http_port,
            self.callback_path
        )
    }

    /// Management port, honouring the process-level override if one is set
    ///
    /// An override that is set but is not a valid port is an error.
    pub fn management_port(&self) -> Result<u16> {
        self.resolve_management_port(|name| std::env::var(name).ok())
    }

    /// Management port, looking the override up through `lookup`
    pub fn resolve_management_port<F>(&self, lookup: F) -> Result<u16>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(name) = self.port_override_env.as_deref() else {
            return Ok(self.management_port);
        };

        match lookup(name) {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => Ok(port),
                _ => Err(Error::Config(format!(
                    "invalid management port override {}={:?}",
                    name, raw
                ))),
            },
            None => Ok(self.management_port),
        }
    }

    /// JMX service URL describing how to reach the management interface
    pub fn connect_url(&self) -> Result<String> {
        Ok(jmx_service_url(&self.management_host, self.management_port()?))
    }
}

/// Format a JMX-over-RMI service URL
pub fn jmx_service_url(host: &str, port: u16) -> String {
    format!(
        "service:jmx:rmi:///jndi/rmi://{}:{}/jmxrmi",
        url_host(host),
        port
    )
}

/// Bracket literal IPv6 addresses so they can be followed by `:port`
fn url_host(host: &str) -> Cow<'_, str> {
    if host.parse::<Ipv6Addr>().is_ok() {
        Cow::Owned(format!("[{}]", host))
    } else {
        Cow::Borrowed(host)
    }
}

/// Builder for [`AgentConfig`]
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    app_name: Option<String>,
    http_port: Option<u16>,
    management_host: Option<String>,
    management_port: Option<u16>,
    port_override_env: Option<Option<String>>,
    registry_url: Option<String>,
    authorization: Option<String>,
    callback_host: Option<String>,
    callback_path: Option<String>,
    retry_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    realm_prefix: Option<String>,
}

impl AgentConfigBuilder {
    /// Set the application name
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the local HTTP port
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    /// Set the management host and port
    pub fn with_management(mut self, host: impl Into<String>, port: u16) -> Self {
        self.management_host = Some(host.into());
        self.management_port = Some(port);
        self
    }

    /// Set (or disable, with `None`) the management port override variable
    pub fn with_port_override_env(mut self, name: Option<String>) -> Self {
        self.port_override_env = Some(name);
        self
    }

    /// Set the registry base URL
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    /// Set the authorization credential
    pub fn with_authorization(mut self, auth: impl Into<String>) -> Self {
        self.authorization = Some(auth.into());
        self
    }

    /// Set the callback host
    pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
        self.callback_host = Some(host.into());
        self
    }

    /// Set the callback path
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = Some(path.into());
        self
    }

    /// Set the retry interval
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the realm prefix
    pub fn with_realm_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.realm_prefix = Some(prefix.into());
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<AgentConfig> {
        let app_name = required_str(self.app_name, "application name")?;
        let http_port = required_port(self.http_port, "local HTTP port")?;
        let management_host = required_str(self.management_host, "management host")?;
        let management_port = required_port(self.management_port, "management port")?;
        let authorization = required_str(self.authorization, "authorization credential")?;
        let callback_host = required_str(self.callback_host, "callback host")?;

        let raw_url = required_str(self.registry_url, "registry URL")?;
        let registry_url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("invalid registry URL '{}': {}", raw_url, e)))?;
        if !matches!(registry_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "registry URL '{}' must use http or https",
                raw_url
            )));
        }

        let retry_interval = self
            .retry_interval
            .ok_or_else(|| missing("retry interval"))?;
        if retry_interval.is_zero() {
            return Err(Error::Config("retry interval must be greater than zero".to_string()));
        }

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        if request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be greater than zero".to_string()));
        }

        let mut callback_path = self
            .callback_path
            .unwrap_or_else(|| DEFAULT_CALLBACK_PATH.to_string());
        if !callback_path.starts_with('/') {
            callback_path.insert(0, '/');
        }

        let realm_prefix = match self.realm_prefix {
            Some(prefix) if !prefix.trim().is_empty() => prefix,
            _ => app_name.clone(),
        };

        let port_override_env = self
            .port_override_env
            .unwrap_or_else(|| Some(DEFAULT_PORT_OVERRIDE_ENV.to_string()))
            .filter(|name| !name.is_empty());

        Ok(AgentConfig {
            app_name,
            http_port,
            management_host,
            management_port,
            port_override_env,
            registry_url,
            authorization,
            callback_host,
            callback_path,
            retry_interval,
            request_timeout,
            realm_prefix,
        })
    }
}

fn missing(what: &str) -> Error {
    Error::Config(format!("missing required value: {}", what))
}

fn required_str(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing(what)),
    }
}

fn required_port(value: Option<u16>, what: &str) -> Result<u16> {
    match value {
        Some(0) => Err(Error::Config(format!("{} must not be 0", what))),
        Some(port) => Ok(port),
        None => Err(missing(what)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> AgentConfigBuilder {
        AgentConfig::builder()
            .with_app_name("inventory")
            .with_http_port(8181)
            .with_management("app.internal", 9091)
            .with_registry_url("https://registry.example:8181")
            .with_authorization("Basic dXNlcjpwYXNz")
            .with_callback_host("agent.internal")
            .with_retry_interval(Duration::from_secs(10))
    }

    #[test]
    fn test_build_with_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.app_name(), "inventory");
        assert_eq!(config.realm_prefix(), "inventory");
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.port_override_env(), Some(DEFAULT_PORT_OVERRIDE_ENV));
        assert_eq!(
            config.callback_url(),
            "http://agent.internal:8181/cryostat-discovery"
        );
    }

    #[test]
    fn test_missing_values_fail_fast() {
        let err = AgentConfig::builder().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = builder().with_authorization("  ").build().unwrap_err();
        assert!(err.to_string().contains("authorization"));
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let err = builder()
            .with_retry_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("retry interval"));
    }

    #[test]
    fn test_invalid_registry_url_rejected() {
        assert!(builder().with_registry_url("not a url").build().is_err());
        assert!(builder().with_registry_url("ftp://registry").build().is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = builder().with_http_port(0).build().unwrap_err();
        assert!(err.to_string().contains("must not be 0"));
    }

    #[test]
    fn test_callback_path_normalized() {
        let config = builder().with_callback_path("discovery").build().unwrap();
        assert_eq!(config.callback_url(), "http://agent.internal:8181/discovery");
    }

    #[test]
    fn test_port_override_preferred() {
        let config = builder().build().unwrap();
        let port = config.resolve_management_port(|name| {
            assert_eq!(name, DEFAULT_PORT_OVERRIDE_ENV);
            Some("9999".to_string())
        });
        assert_eq!(port.unwrap(), 9999);
    }

    #[test]
    fn test_invalid_port_override_rejected() {
        let config = builder().build().unwrap();
        let err = config
            .resolve_management_port(|_| Some("nope".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("JMXREMOTE_PORT"));
        assert!(config.resolve_management_port(|_| Some("0".into())).is_err());
        assert_eq!(config.resolve_management_port(|_| None).unwrap(), 9091);
    }

    #[test]
    fn test_port_override_disabled() {
        let config = builder().with_port_override_env(None).build().unwrap();
        assert_eq!(config.port_override_env(), None);
        assert_eq!(
            config
                .resolve_management_port(|_| Some("9999".into()))
                .unwrap(),
            9091
        );
        assert_eq!(
            config.connect_url().unwrap(),
            "service:jmx:rmi:///jndi/rmi://app.internal:9091/jmxrmi"
        );
    }

    #[test]
    fn test_ipv6_hosts_bracketed() {
        let config = builder()
            .with_callback_host("::1")
            .with_management("fd00::7", 9091)
            .with_port_override_env(None)
            .build()
            .unwrap();
        assert_eq!(config.callback_url(), "http://[::1]:8181/cryostat-discovery");
        assert_eq!(
            config.connect_url().unwrap(),
            "service:jmx:rmi:///jndi/rmi://[fd00::7]:9091/jmxrmi"
        );
        assert_eq!(
            jmx_service_url("10.0.0.4", 9091),
            "service:jmx:rmi:///jndi/rmi://10.0.0.4:9091/jmxrmi"
        );
    }

    #[test]
    fn test_connect_url() {
        assert_eq!(
            jmx_service_url("app.internal", 9091),
            "service:jmx:rmi:///jndi/rmi://app.internal:9091/jmxrmi"
        );
    }
}
