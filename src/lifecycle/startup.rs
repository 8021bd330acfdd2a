//! Startup orchestration.
//!
//! # Responsibilities
//! - Lock the repository before anything is built from it
//! - Build the node and hand it the repository
//! - Launch the control API, then the gateway and mount when enabled
//! - Fan the services' completion signals into one and wait on it
//! - Tear the node down however the wait ends
//!
//! # Design Decisions
//! - Fail fast: any setup error is fatal, and whatever was acquired so far is
//!   released before returning
//! - Services start one after another; each is bound before the next begins
//! - Until the node is built the orchestrator owns the repository and closes
//!   it on failure; afterwards only the node does

use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::error::DaemonError;
use crate::lifecycle::completion::{merge, CompletionSignal};
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownState};
use crate::lifecycle::signals::CancellationSignal;
use crate::net::multiaddr::Multiaddr;
use crate::node::{Node, NodeBuilder, PeerInfo, RoutingMode, TransportConfig};
use crate::repo::Repo;
use crate::service::{
    ApiLauncher, GatewayLauncher, Launcher, MountLauncher, ServiceEndpoint, ServiceError,
    ServiceHandle, ServiceKind,
};

/// Routing selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RoutingOption {
    /// Distributed hash table.
    #[default]
    Dht,
    /// Use the configured supernode servers.
    Supernode,
}

/// Everything the daemon is started with.
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Repository root.
    pub repo_dir: PathBuf,
    /// Initialize the repository first if it does not exist.
    pub init: bool,
    pub routing: RoutingOption,
    /// Start the mount service.
    pub mount: bool,
    /// Gateway write mode; falls back to the config when unset.
    pub writable: Option<bool>,
    pub mount_ipfs: Option<PathBuf>,
    pub mount_ipns: Option<PathBuf>,
    /// Let the control API serve any content.
    pub unrestricted_api: bool,
    pub disable_transport_encryption: bool,
}

impl DaemonOptions {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            ..Self::default()
        }
    }

    fn launchers(&self, config: &NodeConfig) -> Vec<Launcher> {
        let mut launchers = vec![Launcher::Api(ApiLauncher::new(self.unrestricted_api))];
        if config.addresses.gateway_address().is_some() {
            launchers.push(Launcher::Gateway(GatewayLauncher::new(self.writable)));
        }
        if self.mount {
            launchers.push(Launcher::Mount(MountLauncher::new(
                self.mount_ipfs.clone(),
                self.mount_ipns.clone(),
            )));
        }
        launchers
    }
}

/// A daemon whose services are all up.
#[derive(Debug)]
pub struct RunningDaemon {
    node: Node,
    coordinator: ShutdownCoordinator,
    watcher: JoinHandle<()>,
    endpoints: Vec<(ServiceKind, ServiceEndpoint)>,
    merged: CompletionSignal<ServiceError>,
}

impl RunningDaemon {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn state(&self) -> ShutdownState {
        self.coordinator.state()
    }

    /// Where each launched service ended up, in launch order.
    pub fn endpoints(&self) -> &[(ServiceKind, ServiceEndpoint)] {
        &self.endpoints
    }

    /// The bound address of a listener-backed service.
    pub fn address(&self, kind: ServiceKind) -> Option<&Multiaddr> {
        self.endpoints.iter().find_map(|(k, endpoint)| match endpoint {
            ServiceEndpoint::Listener(addr) if *k == kind => Some(addr),
            _ => None,
        })
    }

    /// Block until the first service error or until every service has
    /// stopped, then close the node.
    pub async fn wait(self) -> Result<ShutdownOutcome, DaemonError> {
        let supervised = self.coordinator.supervise(self.merged).await;
        if let Err(e) = &supervised {
            tracing::error!(service = %e.kind(), error = %e, "Service failed");
        }

        self.coordinator.begin_closing();
        let closed = self.node.close().await;
        let outcome = self.coordinator.mark_closed();
        let _ = self.watcher.await;

        supervised?;
        closed?;
        Ok(outcome)
    }
}

/// Lock, build and launch. Returns once every service is serving.
pub async fn start(
    options: DaemonOptions,
    cancel: CancellationSignal,
) -> Result<RunningDaemon, DaemonError> {
    println!("Initializing daemon...");

    let coordinator = ShutdownCoordinator::new(cancel.clone());
    let watcher = coordinator.watch_cancellation();

    match launch(&options, &coordinator, cancel).await {
        Ok((node, services)) => {
            let endpoints = services
                .iter()
                .map(|s| (s.kind(), s.endpoint().clone()))
                .collect();
            let merged = merge(services.into_iter().map(|s| Some(s.into_completion())));
            Ok(RunningDaemon {
                node,
                coordinator,
                watcher,
                endpoints,
                merged,
            })
        }
        Err(e) => {
            coordinator.begin_closing();
            coordinator.mark_closed();
            let _ = watcher.await;
            Err(e)
        }
    }
}

/// Start the daemon and run it until it stops.
pub async fn run_daemon(
    options: DaemonOptions,
    cancel: CancellationSignal,
) -> Result<ShutdownOutcome, DaemonError> {
    start(options, cancel).await?.wait().await
}

async fn launch(
    options: &DaemonOptions,
    coordinator: &ShutdownCoordinator,
    cancel: CancellationSignal,
) -> Result<(Node, Vec<ServiceHandle>), DaemonError> {
    let transport = TransportConfig {
        encrypted: !options.disable_transport_encryption,
    };
    if !transport.encrypted {
        tracing::warn!(
            "Running with --disable-transport-encryption: all connections are UNENCRYPTED. \
             You will not be able to connect to regular encrypted networks."
        );
    }

    if options.init && !Repo::is_initialized(&options.repo_dir) {
        Repo::init(&options.repo_dir).map_err(DaemonError::Init)?;
    }

    let repo = Repo::open(&options.repo_dir)?;

    let routing = match options.routing {
        RoutingOption::Dht => RoutingMode::Dht,
        RoutingOption::Supernode => match supernode_peers(&repo.config().supernode_routing.servers) {
            Ok(peers) => RoutingMode::Supernode(peers),
            Err(e) => {
                // ownership has not moved to a node yet
                close_repo(repo, &options.repo_dir);
                return Err(e);
            }
        },
    };

    let node = match NodeBuilder::new()
        .online(true)
        .repo(repo)
        .routing(routing)
        .transport(transport)
        .cancellation(cancel)
        .build()
        .await
    {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(error = %e, "Error from node construction");
            let (kind, repo) = e.into_parts();
            if let Some(repo) = repo {
                close_repo(repo, &options.repo_dir);
            }
            return Err(DaemonError::Build(kind));
        }
    };

    let handle = node.handle();
    for addr in handle.swarm_addrs() {
        println!("Swarm listening on {}", addr);
    }

    let mut services = Vec::new();
    for launcher in options.launchers(handle.config()) {
        let kind = launcher.kind();
        match launcher.launch(&node).await {
            Ok(service) => services.push(service),
            Err(e) => {
                tracing::error!(service = %kind, error = %e, "Service failed to start");
                if let Err(close) = node.close().await {
                    tracing::error!(error = %close, "Failed to close node after launch error");
                }
                return Err(e.into());
            }
        }
        if kind == ServiceKind::Api {
            coordinator.mark_running();
        }
    }

    tracing::info!(services = services.len(), "Daemon is ready");
    Ok((node, services))
}

/// Parse the configured supernode servers into peer infos.
pub fn supernode_peers(servers: &[String]) -> Result<Vec<PeerInfo>, DaemonError> {
    servers
        .iter()
        .map(|server| {
            let addr: Multiaddr = server.parse().map_err(|source| DaemonError::Routing {
                value: server.clone(),
                source,
            })?;
            PeerInfo::from_multiaddr(&addr).ok_or_else(|| DaemonError::RoutingPeer {
                value: server.clone(),
            })
        })
        .collect()
}

fn close_repo(repo: Repo, root: &Path) {
    if let Err(e) = repo.close() {
        tracing::error!(path = %root.display(), error = %e, "Failed to release repository");
    }
}
