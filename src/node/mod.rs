//! The running node.
//!
//! # Responsibilities
//! - Hold the configuration snapshot, identity and bound swarm addresses
//! - Own the repository once built, and release it exactly once on close
//! - Track every background task it spawns so closing cascades to them
//!
//! # Design Decisions
//! - The orchestrator owns the [`Node`]; services only get a [`NodeHandle`]
//! - Lifecycle state lives on a watch channel that doubles as the children's
//!   shutdown signal
//!
//! # Data Flow
//! ```text
//! NodeBuilder::build ──▶ Node (Running)
//!                          │ spawn_child: swarm accept loops, services, mount watcher
//!                          ▼
//! cancellation / close ──▶ Closing ──▶ children drained ──▶ repo closed ──▶ Closed
//! ```

pub mod builder;
pub mod content;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::NodeConfig;
use crate::net::multiaddr::Multiaddr;
use crate::repo::{Repo, RepoError};

pub use builder::{BuildError, BuildErrorKind, NodeBuilder};
pub use content::ContentStore;

/// Lifecycle of a [`Node`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Constructing,
    Running,
    Closing,
    Closed,
}

/// Transport settings threaded into the node at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Encrypt peer connections.
    pub encrypted: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { encrypted: true }
    }
}

/// A remote peer: its id and the address it is reachable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: String,
    pub addr: Multiaddr,
}

impl PeerInfo {
    /// Split a `/ip4/../tcp/../ipfs/<peer>` address into a peer info.
    /// Returns `None` when the address carries no peer id.
    pub fn from_multiaddr(addr: &Multiaddr) -> Option<Self> {
        let id = addr.peer_id()?.to_string();
        Some(Self {
            id,
            addr: addr.transport(),
        })
    }
}

/// How the node finds content and peers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoutingMode {
    /// Distributed hash table.
    #[default]
    Dht,
    /// Delegate routing to a fixed set of servers.
    Supernode(Vec<PeerInfo>),
}

impl RoutingMode {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingMode::Dht => "dht",
            RoutingMode::Supernode(_) => "supernode",
        }
    }
}

/// Errors raised while closing a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to close repository: {0}")]
    Repo(#[from] RepoError),
}

#[derive(Debug)]
struct NodeInner {
    config: NodeConfig,
    peer_id: String,
    swarm_addrs: Vec<Multiaddr>,
    routing: RoutingMode,
    transport: TransportConfig,
    online: bool,
    content: ContentStore,
    services: DashMap<String, String>,
    state: watch::Sender<NodeState>,
    started: Instant,
}

/// Cloneable, read-only view of a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    inner: Arc<NodeInner>,
}

impl NodeHandle {
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn peer_id(&self) -> &str {
        &self.inner.peer_id
    }

    /// Addresses the swarm is actually listening on.
    pub fn swarm_addrs(&self) -> &[Multiaddr] {
        &self.inner.swarm_addrs
    }

    pub fn routing(&self) -> &RoutingMode {
        &self.inner.routing
    }

    pub fn transport(&self) -> TransportConfig {
        self.inner.transport
    }

    pub fn is_online(&self) -> bool {
        self.inner.online
    }

    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    pub fn state(&self) -> NodeState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NodeState> {
        self.inner.state.subscribe()
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Resolve once the node has left `Running`.
    pub async fn closing(&self) {
        let mut rx = self.inner.state.subscribe();
        // sender is owned by `inner`, which outlives this borrow
        let _ = rx.wait_for(|state| *state >= NodeState::Closing).await;
    }

    /// Record a running service and where it can be reached.
    pub fn register_service(&self, name: &str, endpoint: impl Into<String>) {
        self.inner.services.insert(name.to_string(), endpoint.into());
    }

    pub fn unregister_service(&self, name: &str) {
        self.inner.services.remove(name);
    }

    /// Running services, sorted by name.
    pub fn services(&self) -> Vec<(String, String)> {
        let mut services: Vec<_> = self
            .inner
            .services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        services.sort();
        services
    }

    fn advance(&self, to: NodeState) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if to > *current {
                *current = to;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(state = ?to, "Node state changed");
        }
        changed
    }

    /// Ask the node to stop its children. Teardown itself is [`Node::close`].
    pub(crate) fn begin_closing(&self) -> bool {
        self.advance(NodeState::Closing)
    }
}

/// A built node. Owns the repository and every background task it spawned.
#[derive(Debug)]
pub struct Node {
    handle: NodeHandle,
    children: Mutex<JoinSet<()>>,
    repo: Mutex<Option<Repo>>,
    teardown: tokio::sync::Mutex<()>,
}

impl Node {
    pub(crate) fn new(
        repo: Repo,
        peer_id: String,
        swarm_addrs: Vec<Multiaddr>,
        routing: RoutingMode,
        transport: TransportConfig,
        online: bool,
    ) -> Self {
        let (state, _) = watch::channel(NodeState::Constructing);
        let inner = NodeInner {
            config: repo.config().clone(),
            peer_id,
            swarm_addrs,
            routing,
            transport,
            online,
            content: ContentStore::new(),
            services: DashMap::new(),
            state,
            started: Instant::now(),
        };
        Self {
            handle: NodeHandle {
                inner: Arc::new(inner),
            },
            children: Mutex::new(JoinSet::new()),
            repo: Mutex::new(Some(repo)),
            teardown: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn mark_running(&self) {
        self.handle.advance(NodeState::Running);
    }

    /// A read-only handle for services.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> NodeState {
        self.handle.state()
    }

    /// Spawn a task whose lifetime is bound to the node. The task is expected
    /// to watch [`NodeHandle::closing`] and return when it fires.
    pub fn spawn_child<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        children.spawn(async move {
            task.await;
            tracing::trace!(task = name, "Node task finished");
        });
    }

    /// Tear the node down: stop and await every child, then release the
    /// repository. Safe to call more than once; later calls do nothing.
    pub async fn close(&self) -> Result<(), NodeError> {
        let _teardown = self.teardown.lock().await;
        if self.state() == NodeState::Closed {
            return Ok(());
        }

        self.handle.advance(NodeState::Closing);

        let mut children = std::mem::take(
            &mut *self.children.lock().unwrap_or_else(PoisonError::into_inner),
        );
        tracing::debug!(tasks = children.len(), "Waiting for node tasks");
        while let Some(joined) = children.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "Node task panicked");
                }
            }
        }

        self.handle.inner.services.clear();

        let repo = self.repo.lock().unwrap_or_else(PoisonError::into_inner).take();
        let result = match repo {
            Some(repo) => repo.close().map_err(NodeError::from),
            None => Ok(()),
        };

        self.handle.advance(NodeState::Closed);
        tracing::info!(peer_id = %self.handle.peer_id(), "Node closed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoLock;

    fn open_repo(dir: &std::path::Path) -> Repo {
        let mut config = NodeConfig::default();
        config.addresses.swarm = vec!["/ip4/127.0.0.1/tcp/0".to_string()];
        Repo::init_with(dir, config).unwrap();
        Repo::open(dir).unwrap()
    }

    #[tokio::test]
    async fn close_releases_repo_once() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeBuilder::new()
            .repo(open_repo(dir.path()))
            .build()
            .await
            .unwrap();

        assert_eq!(node.state(), NodeState::Running);
        assert!(RepoLock::is_locked(dir.path()).unwrap());

        node.close().await.unwrap();
        assert_eq!(node.state(), NodeState::Closed);
        assert!(!RepoLock::is_locked(dir.path()).unwrap());

        // second close is a no-op rather than a second release
        node.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_waits_for_children() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeBuilder::new()
            .online(false)
            .repo(open_repo(dir.path()))
            .build()
            .await
            .unwrap();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let handle = node.handle();
        node.spawn_child("test", async move {
            handle.closing().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = done_tx.send(());
        });

        node.close().await.unwrap();
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test]
    async fn service_registry_is_cleared_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeBuilder::new()
            .online(false)
            .repo(open_repo(dir.path()))
            .build()
            .await
            .unwrap();

        let handle = node.handle();
        handle.register_service("gateway", "/ip4/127.0.0.1/tcp/8080");
        handle.register_service("api", "/ip4/127.0.0.1/tcp/5001");
        assert_eq!(handle.services()[0].0, "api");

        node.close().await.unwrap();
        assert!(handle.services().is_empty());
    }

    #[test]
    fn peer_info_requires_peer_component() {
        let with: Multiaddr = "/ip4/10.0.0.1/tcp/4001/ipfs/QmPeer".parse().unwrap();
        let info = PeerInfo::from_multiaddr(&with).unwrap();
        assert_eq!(info.id, "QmPeer");
        assert_eq!(info.addr.to_string(), "/ip4/10.0.0.1/tcp/4001");

        let without: Multiaddr = "/ip4/10.0.0.1/tcp/4001".parse().unwrap();
        assert!(PeerInfo::from_multiaddr(&without).is_none());
    }
}
