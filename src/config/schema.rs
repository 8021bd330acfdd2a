//! Configuration schema definitions.
//!
//! This module defines the complete on-disk configuration of a node
//! repository. All types derive Serde traits for (de)serialization from the
//! repository's `config.toml`.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for a node.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer identity of this node.
    pub identity: IdentityConfig,

    /// Listener addresses for the swarm, control API and gateway.
    pub addresses: AddressesConfig,

    /// Public gateway settings.
    pub gateway: GatewayConfig,

    /// Filesystem mount points.
    pub mounts: MountsConfig,

    /// Servers used when the node runs with supernode routing.
    pub supernode_routing: SupernodeRoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Peer identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base58 peer identifier, generated by `init`.
    pub peer_id: String,
}

/// Network addresses, expressed as multiaddrs (e.g. `/ip4/127.0.0.1/tcp/5001`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AddressesConfig {
    /// Swarm listener addresses.
    pub swarm: Vec<String>,

    /// Control API listener address.
    pub api: String,

    /// Gateway listener address. The gateway is not started when unset or
    /// empty.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub gateway: Option<String>,
}

impl AddressesConfig {
    /// The gateway address, if one is configured.
    pub fn gateway_address(&self) -> Option<&str> {
        self.gateway.as_deref().filter(|addr| !addr.trim().is_empty())
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

impl Default for AddressesConfig {
    fn default() -> Self {
        Self {
            swarm: vec!["/ip4/0.0.0.0/tcp/4001".to_string()],
            api: "/ip4/127.0.0.1/tcp/5001".to_string(),
            gateway: Some("/ip4/127.0.0.1/tcp/8080".to_string()),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Redirect target for requests to `/`.
    pub root_redirect: Option<String>,

    /// Accept PUT and DELETE requests on the gateway.
    pub writable: bool,

    /// URL of a newline-delimited list of keys the gateway may serve.
    pub allow_list: Option<String>,

    /// URL of a newline-delimited list of keys the gateway must refuse.
    pub deny_list: Option<String>,
}

/// Filesystem mount points.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MountsConfig {
    /// Mount point for immutable content.
    pub ipfs: String,

    /// Mount point for the mutable namespace.
    pub ipns: String,

    /// How often a running mount verifies its mount points, in milliseconds.
    pub check_interval_ms: u64,
}

impl Default for MountsConfig {
    fn default() -> Self {
        Self {
            ipfs: "/ipfs".to_string(),
            ipns: "/ipns".to_string(),
            check_interval_ms: 1000,
        }
    }
}

/// Supernode routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SupernodeRoutingConfig {
    /// Server peer infos (e.g. `/ip4/10.0.0.1/tcp/4002/ipfs/Qm...`).
    pub servers: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Path of the Prometheus exposition endpoint on the control API.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_path: "/debug/metrics/prometheus".to_string(),
        }
    }
}
