//! Network-facing services launched against a built node.
//!
//! # Responsibilities
//! - Bind each service's listener (or check its mount points) up front
//! - Report the resolved endpoint before returning
//! - Run the service as a node child and deliver its termination on a
//!   [`CompletionSignal`]
//!
//! # Design Decisions
//! - Every launcher returns the same [`ServiceHandle`], so the orchestrator
//!   treats the control API, the gateway and the mount alike
//! - Setup failures are immediate errors; nothing is left running
//! - Services stop when the node leaves `Running`

pub mod api;
pub mod gateway;
pub mod mount;

use axum::Router;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::keys::KeySetError;
use crate::lifecycle::completion::{completion_channel, CompletionSignal};
use crate::net::listener::{Listener, ListenerError};
use crate::net::multiaddr::Multiaddr;
use crate::node::Node;
use crate::observability::metrics;

pub use api::ApiLauncher;
pub use gateway::GatewayLauncher;
pub use mount::MountLauncher;

/// The kinds of service the daemon runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Api,
    Gateway,
    Mount,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Api => "api",
            ServiceKind::Gateway => "gateway",
            ServiceKind::Mount => "mount",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a running service can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEndpoint {
    /// The address actually bound.
    Listener(Multiaddr),
    /// The mount points in use.
    Mount { ipfs: PathBuf, ipns: PathBuf },
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEndpoint::Listener(addr) => write!(f, "{}", addr),
            ServiceEndpoint::Mount { ipfs, ipns } => {
                write!(f, "{} {}", ipfs.display(), ipns.display())
            }
        }
    }
}

/// Unrecoverable failure of a running service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} server failed: {source}")]
    Serve {
        kind: ServiceKind,
        #[source]
        source: std::io::Error,
    },

    #[error("mount point {} went away", path.display())]
    MountLost { path: PathBuf },
}

impl ServiceError {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceError::Serve { kind, .. } => *kind,
            ServiceError::MountLost { .. } => ServiceKind::Mount,
        }
    }
}

/// A service that could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{kind}: {source}")]
    Listener {
        kind: ServiceKind,
        #[source]
        source: ListenerError,
    },

    #[error("{kind}: no address configured")]
    NotConfigured { kind: ServiceKind },

    #[error("gateway {list}: {source}")]
    KeySet {
        list: &'static str,
        #[source]
        source: KeySetError,
    },

    #[error("mount point {} is not a directory", path.display())]
    MountPoint { path: PathBuf },
}

/// A launched service.
#[derive(Debug)]
pub struct ServiceHandle {
    kind: ServiceKind,
    endpoint: ServiceEndpoint,
    completion: CompletionSignal<ServiceError>,
}

impl ServiceHandle {
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// The bound address, for listener-backed services.
    pub fn address(&self) -> Option<&Multiaddr> {
        match &self.endpoint {
            ServiceEndpoint::Listener(addr) => Some(addr),
            ServiceEndpoint::Mount { .. } => None,
        }
    }

    /// Give up the handle for its completion signal.
    pub fn into_completion(self) -> CompletionSignal<ServiceError> {
        self.completion
    }
}

/// Any of the daemon's services, ready to launch.
#[derive(Debug, Clone)]
pub enum Launcher {
    Api(ApiLauncher),
    Gateway(GatewayLauncher),
    Mount(MountLauncher),
}

impl Launcher {
    pub fn kind(&self) -> ServiceKind {
        match self {
            Launcher::Api(_) => ServiceKind::Api,
            Launcher::Gateway(_) => ServiceKind::Gateway,
            Launcher::Mount(_) => ServiceKind::Mount,
        }
    }

    /// Start the service against `node`.
    pub async fn launch(self, node: &Node) -> Result<ServiceHandle, LaunchError> {
        match self {
            Launcher::Api(launcher) => launcher.launch(node).await,
            Launcher::Gateway(launcher) => launcher.launch(node).await,
            Launcher::Mount(launcher) => launcher.launch(node).await,
        }
    }
}

/// Bind `address` for a service of `kind`.
pub(crate) async fn bind(kind: ServiceKind, address: &str) -> Result<Listener, LaunchError> {
    Listener::bind_str(address)
        .await
        .map_err(|source| LaunchError::Listener { kind, source })
}

/// Serve `router` on `listener` as a child of `node` until the node closes.
pub(crate) fn serve_http(
    node: &Node,
    kind: ServiceKind,
    listener: Listener,
    router: Router,
) -> ServiceHandle {
    let address = listener.local_multiaddr().clone();
    let handle = node.handle();
    let (done, completion) = completion_channel();

    handle.register_service(kind.name(), address.to_string());
    metrics::record_service_started(kind.name());

    let shutdown = handle.clone();
    let served = address.clone();
    node.spawn_child(kind.name(), async move {
        let result = axum::serve(listener.into_inner(), router)
            .with_graceful_shutdown(async move { shutdown.closing().await })
            .await;

        handle.unregister_service(kind.name());
        metrics::record_service_stopped(kind.name());
        match &result {
            Ok(()) => tracing::info!(service = %kind, address = %served, "Server stopped"),
            Err(e) => tracing::error!(service = %kind, address = %served, error = %e, "Server failed"),
        }

        done.finish(result.map_err(|source| ServiceError::Serve { kind, source }))
            .await;
    });

    ServiceHandle {
        kind,
        endpoint: ServiceEndpoint::Listener(address),
        completion,
    }
}
