//! Configuration validation.
//!
//! Serde handles the syntactic layer; this module checks the values: every
//! listen address must be a usable multiaddr, list sources must be HTTP(S) URLs,
//! intervals must be positive. All problems are reported, not just the first.

use thiserror::Error;
use url::Url;

use crate::config::schema::NodeConfig;
use crate::net::multiaddr::Multiaddr;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid {field} URL {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "addresses.api", &config.addresses.api);
    if let Some(gateway) = config.addresses.gateway_address() {
        check_address(&mut errors, "addresses.gateway", gateway);
    }
    for swarm in &config.addresses.swarm {
        check_address(&mut errors, "addresses.swarm", swarm);
    }

    if let Some(list) = &config.gateway.allow_list {
        check_list_url(&mut errors, "gateway.allow_list", list);
    }
    if let Some(list) = &config.gateway.deny_list {
        check_list_url(&mut errors, "gateway.deny_list", list);
    }
    if matches!(&config.gateway.root_redirect, Some(target) if target.is_empty()) {
        errors.push(ValidationError::Empty {
            field: "gateway.root_redirect",
        });
    }

    if config.mounts.check_interval_ms == 0 {
        errors.push(ValidationError::NotPositive {
            field: "mounts.check_interval_ms",
        });
    }
    if config.mounts.ipfs.is_empty() {
        errors.push(ValidationError::Empty { field: "mounts.ipfs" });
    }
    if config.mounts.ipns.is_empty() {
        errors.push(ValidationError::Empty { field: "mounts.ipns" });
    }

    if !config.observability.metrics_path.starts_with('/') {
        errors.push(ValidationError::InvalidUrl {
            field: "observability.metrics_path",
            value: config.observability.metrics_path.clone(),
            reason: "must start with '/'".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<Multiaddr>() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        });
    }
}

fn check_list_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}
