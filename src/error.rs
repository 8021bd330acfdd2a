//! Top-level daemon error.

use thiserror::Error;

use crate::net::multiaddr::AddrError;
use crate::node::{BuildErrorKind, NodeError};
use crate::repo::RepoError;
use crate::service::{LaunchError, ServiceError};

/// Everything that can stop the daemon, at setup or at run time.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to initialize repository: {0}")]
    Init(#[source] RepoError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("invalid supernode server {value:?}: {source}")]
    Routing {
        value: String,
        #[source]
        source: AddrError,
    },

    #[error("supernode server {value:?} has no peer id")]
    RoutingPeer { value: String },

    #[error("failed to build node: {0}")]
    Build(#[source] BuildErrorKind),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to shut down node: {0}")]
    Close(#[from] NodeError),
}

impl DaemonError {
    /// Whether the error happened before any service was serving.
    pub fn is_setup(&self) -> bool {
        !matches!(self, DaemonError::Service(_) | DaemonError::Close(_))
    }
}
