//! Node construction.
//!
//! The builder takes ownership of an opened [`Repo`]. On success the repo
//! moves into the [`Node`]; on failure it is handed back inside the
//! [`BuildError`] so the caller can release it.

use thiserror::Error;

use crate::lifecycle::signals::CancellationSignal;
use crate::net::listener::{Listener, ListenerError};
use crate::node::{Node, NodeHandle, RoutingMode, TransportConfig};
use crate::repo::Repo;

/// Why a build failed.
#[derive(Debug, Error)]
pub enum BuildErrorKind {
    #[error("no repository was provided")]
    MissingRepo,

    #[error("repository has no peer identity")]
    MissingIdentity,

    #[error("swarm listener: {0}")]
    Swarm(#[from] ListenerError),
}

/// A failed build. Carries the repository back when one was given.
#[derive(Debug, Error)]
#[error("failed to build node: {kind}")]
pub struct BuildError {
    kind: BuildErrorKind,
    repo: Option<Repo>,
}

impl BuildError {
    fn new(kind: impl Into<BuildErrorKind>, repo: Option<Repo>) -> Self {
        Self {
            kind: kind.into(),
            repo,
        }
    }

    pub fn kind(&self) -> &BuildErrorKind {
        &self.kind
    }

    /// Split into the cause and the repository that still needs closing.
    pub fn into_parts(self) -> (BuildErrorKind, Option<Repo>) {
        (self.kind, self.repo)
    }
}

/// Builder for a [`Node`].
#[derive(Debug)]
pub struct NodeBuilder {
    online: bool,
    repo: Option<Repo>,
    routing: RoutingMode,
    transport: TransportConfig,
    cancel: Option<CancellationSignal>,
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self {
            online: true,
            repo: None,
            routing: RoutingMode::default(),
            transport: TransportConfig::default(),
            cancel: None,
        }
    }
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to open swarm listeners.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn repo(mut self, repo: Repo) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn routing(mut self, routing: RoutingMode) -> Self {
        self.routing = routing;
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Begin closing the node's children when `cancel` fires.
    pub fn cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Construct the node.
    pub async fn build(self) -> Result<Node, BuildError> {
        let Some(repo) = self.repo else {
            return Err(BuildError::new(BuildErrorKind::MissingRepo, None));
        };

        let peer_id = repo.config().identity.peer_id.clone();
        if peer_id.is_empty() {
            return Err(BuildError::new(BuildErrorKind::MissingIdentity, Some(repo)));
        }

        let mut listeners = Vec::new();
        if self.online {
            let swarm = repo.config().addresses.swarm.clone();
            for addr in &swarm {
                match Listener::bind_str(addr).await {
                    Ok(listener) => listeners.push(listener),
                    Err(e) => return Err(BuildError::new(e, Some(repo))),
                }
            }
        }

        let swarm_addrs = listeners
            .iter()
            .map(|l| l.local_multiaddr().clone())
            .collect();

        tracing::info!(
            peer_id = %peer_id,
            routing = self.routing.name(),
            encrypted = self.transport.encrypted,
            online = self.online,
            "Node built"
        );

        let node = Node::new(
            repo,
            peer_id,
            swarm_addrs,
            self.routing,
            self.transport,
            self.online,
        );

        for listener in listeners {
            node.spawn_child("swarm", accept_loop(listener, node.handle()));
        }

        if let Some(cancel) = self.cancel {
            let handle = node.handle();
            node.spawn_child("cancellation", async move {
                tokio::select! {
                    _ = cancel.fired() => {
                        if handle.begin_closing() {
                            tracing::debug!("Node closing on cancellation");
                        }
                    }
                    _ = handle.closing() => {}
                }
            });
        }

        node.mark_running();
        Ok(node)
    }
}

/// Accept swarm connections until the node starts closing. Peer protocols
/// are out of scope, so connections are logged and dropped.
async fn accept_loop(listener: Listener, node: NodeHandle) {
    let local = listener.local_multiaddr().clone();
    loop {
        tokio::select! {
            _ = node.closing() => break,
            accepted = listener.accept() => match accepted {
                Ok((_stream, peer)) => {
                    tracing::debug!(
                        address = %local,
                        peer = %peer,
                        encrypted = node.transport().encrypted,
                        "Swarm connection"
                    );
                }
                Err(e) => {
                    tracing::warn!(address = %local, error = %e, "Swarm accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            },
        }
    }
    tracing::debug!(address = %local, "Swarm listener stopped");
}
