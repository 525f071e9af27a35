//! Data models exchanged with the discovery registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Node type advertised for this process
pub const NODE_TYPE: &str = "JVM";

/// Request body for a registration attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Unique label for this attempt
    pub realm: String,
    /// Where the registry can reach this agent's discovery endpoint
    pub callback: String,
}

impl RegistrationRequest {
    /// Build a request with a freshly generated realm
    pub fn new(realm_prefix: &str, callback: impl Into<String>) -> Self {
        Self {
            realm: format!("{}-{}", realm_prefix, Uuid::new_v4()),
            callback: callback.into(),
        }
    }
}

/// Identity assigned by the registry on successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdentity {
    /// Opaque plugin id
    pub id: String,

    /// Token the registry may hand back alongside the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment the registry may hand back alongside the id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl PluginIdentity {
    /// Create an identity with just an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: None,
            env: HashMap::new(),
        }
    }
}

/// Envelope the registry wraps registration results in
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationResponse {
    /// Response payload
    pub data: ResponseData,
}

/// Payload section of [`RegistrationResponse`]
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseData {
    /// The assigned identity
    pub result: PluginIdentity,
}

impl RegistrationResponse {
    /// Extract the assigned identity
    pub fn into_identity(self) -> PluginIdentity {
        self.data.result
    }
}

/// Descriptor published to the registry once registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDescriptor {
    /// Node name, derived from the plugin id
    pub name: String,
    /// Always [`NODE_TYPE`]
    pub node_type: String,
    /// How to reach this process
    pub target: Target,
}

/// Reachable management endpoint of this process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Management connect URL
    pub connect_url: String,
    /// Application name
    pub alias: String,
}

impl DiscoveryDescriptor {
    /// Build the descriptor for a freshly assigned identity
    pub fn for_plugin(
        realm_prefix: &str,
        plugin: &PluginIdentity,
        connect_url: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            name: format!("{}-{}", realm_prefix, plugin.id),
            node_type: NODE_TYPE.to_string(),
            target: Target {
                connect_url: connect_url.into(),
                alias: alias.into(),
            },
        }
    }
}
