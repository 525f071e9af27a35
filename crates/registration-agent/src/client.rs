//! Registry client interface and its HTTP implementation

use crate::{
    config::AgentConfig,
    error::{Error, Result},
    models::*,
};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client as ReqwestClient, Response, Url};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Path segments of the discovery API below the registry base URL
const DISCOVERY_PATH: [&str; 3] = ["api", "v2.2", "discovery"];

/// Registry call, used to label log lines and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    /// Registration of a new plugin
    Register,
    /// Publication of discovery descriptors
    Publish,
    /// Removal of a plugin
    Deregister,
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryOperation::Register => write!(f, "register"),
            RegistryOperation::Publish => write!(f, "publish"),
            RegistryOperation::Deregister => write!(f, "deregister"),
        }
    }
}

/// Operations the controller needs from the discovery registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Register this process and obtain a plugin identity
    async fn register(&self, request: &RegistrationRequest, auth: &str) -> Result<PluginIdentity>;

    /// Publish the descriptors for a registered plugin
    async fn update(
        &self,
        plugin_id: &str,
        auth: &str,
        nodes: &HashSet<DiscoveryDescriptor>,
    ) -> Result<()>;

    /// Remove a registered plugin
    async fn deregister(&self, plugin_id: &str, auth: &str) -> Result<()>;
}

/// [`RegistryClient`] speaking the registry's HTTP discovery API
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    http: ReqwestClient,
}

impl HttpRegistryClient {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { base_url, http })
    }

    /// Create a client from the agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(config.registry_url().clone(), config.request_timeout())
    }

    /// Base URL of the registry
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Discovery endpoint, optionally for a specific plugin
    pub fn discovery_url(&self, plugin_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::Config(format!("registry URL '{}' cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty().extend(DISCOVERY_PATH);
            if let Some(id) = plugin_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn ensure_success(operation: RegistryOperation, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("Registry {} failed with {}: {}", operation, status, body);
        Err(Error::Protocol {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register(&self, request: &RegistrationRequest, auth: &str) -> Result<PluginIdentity> {
        let url = self.discovery_url(None)?;
        debug!("POST {} realm={}", url, request.realm);

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, auth)
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(RegistryOperation::Register, response).await?;

        let body = response.text().await?;
        let parsed: RegistrationResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", e, body)))?;
        let identity = parsed.into_identity();
        if identity.id.is_empty() {
            return Err(Error::MalformedResponse("empty plugin id".to_string()));
        }
        Ok(identity)
    }

    async fn update(
        &self,
        plugin_id: &str,
        auth: &str,
        nodes: &HashSet<DiscoveryDescriptor>,
    ) -> Result<()> {
        let url = self.discovery_url(Some(plugin_id))?;
        debug!("POST {} with {} node(s)", url, nodes.len());

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, auth)
            .json(nodes)
            .send()
            .await?;
        Self::ensure_success(RegistryOperation::Publish, response).await?;
        Ok(())
    }

    async fn deregister(&self, plugin_id: &str, auth: &str) -> Result<()> {
        let url = self.discovery_url(Some(plugin_id))?;
        debug!("DELETE {}", url);

        let response = self
            .http
            .delete(url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        Self::ensure_success(RegistryOperation::Deregister, response).await?;
        Ok(())
    }
}
