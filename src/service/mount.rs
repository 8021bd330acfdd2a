//! Filesystem mount service.
//!
//! No filesystem is attached here; the service claims the two mount points,
//! watches that they stay in place, and reports when one disappears.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lifecycle::completion::{completion_channel, CompletionSender};
use crate::node::{Node, NodeHandle};
use crate::observability::metrics;
use crate::service::{LaunchError, ServiceEndpoint, ServiceError, ServiceHandle, ServiceKind};

/// Launches the mount service.
#[derive(Debug, Clone, Default)]
pub struct MountLauncher {
    /// Overrides `mounts.ipfs` when set.
    pub ipfs: Option<PathBuf>,
    /// Overrides `mounts.ipns` when set.
    pub ipns: Option<PathBuf>,
}

impl MountLauncher {
    pub fn new(ipfs: Option<PathBuf>, ipns: Option<PathBuf>) -> Self {
        Self { ipfs, ipns }
    }

    pub async fn launch(self, node: &Node) -> Result<ServiceHandle, LaunchError> {
        let handle = node.handle();
        let config = &handle.config().mounts;
        let ipfs = self.ipfs.unwrap_or_else(|| PathBuf::from(&config.ipfs));
        let ipns = self.ipns.unwrap_or_else(|| PathBuf::from(&config.ipns));
        let interval = Duration::from_millis(config.check_interval_ms);

        for path in [&ipfs, &ipns] {
            if !is_dir(path).await {
                return Err(LaunchError::MountPoint { path: path.clone() });
            }
        }

        println!("IPFS mounted at: {}", ipfs.display());
        println!("IPNS mounted at: {}", ipns.display());
        tracing::info!(ipfs = %ipfs.display(), ipns = %ipns.display(), "Mounted");

        let endpoint = ServiceEndpoint::Mount {
            ipfs: ipfs.clone(),
            ipns: ipns.clone(),
        };
        handle.register_service(ServiceKind::Mount.name(), endpoint.to_string());
        metrics::record_service_started(ServiceKind::Mount.name());

        let (done, completion) = completion_channel();
        node.spawn_child(
            ServiceKind::Mount.name(),
            watch_mounts(handle.clone(), vec![ipfs, ipns], interval, done),
        );

        Ok(ServiceHandle {
            kind: ServiceKind::Mount,
            endpoint,
            completion,
        })
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Poll the mount points until the node closes or one of them is gone.
async fn watch_mounts(
    node: NodeHandle,
    paths: Vec<PathBuf>,
    interval: Duration,
    done: CompletionSender<ServiceError>,
) {
    let mut ticker = tokio::time::interval(interval);
    let result = loop {
        tokio::select! {
            _ = node.closing() => break Ok(()),
            _ = ticker.tick() => {
                let mut lost = None;
                for path in &paths {
                    if !is_dir(path).await {
                        lost = Some(path.clone());
                        break;
                    }
                }
                if let Some(path) = lost {
                    tracing::error!(path = %path.display(), "Mount point lost");
                    break Err(ServiceError::MountLost { path });
                }
            }
        }
    };

    node.unregister_service(ServiceKind::Mount.name());
    metrics::record_service_stopped(ServiceKind::Mount.name());
    if result.is_ok() {
        tracing::info!("Unmounted");
    }
    done.finish(result).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::node::NodeBuilder;
    use crate::repo::Repo;

    async fn node_with_mounts(dir: &Path) -> Node {
        let repo_dir = dir.join("repo");
        let mut config = NodeConfig::default();
        config.mounts.ipfs = dir.join("ipfs").display().to_string();
        config.mounts.ipns = dir.join("ipns").display().to_string();
        config.mounts.check_interval_ms = 10;
        Repo::init_with(&repo_dir, config).unwrap();
        NodeBuilder::new()
            .online(false)
            .repo(Repo::open(&repo_dir).unwrap())
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_mount_point_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = node_with_mounts(dir.path()).await;

        let err = MountLauncher::default().launch(&node).await.unwrap_err();
        assert!(matches!(err, LaunchError::MountPoint { .. }));
        node.close().await.unwrap();
    }

    #[tokio::test]
    async fn lost_mount_point_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ipfs")).unwrap();
        std::fs::create_dir(dir.path().join("ipns")).unwrap();
        let node = node_with_mounts(dir.path()).await;

        let service = MountLauncher::default().launch(&node).await.unwrap();
        assert!(service.address().is_none());

        std::fs::remove_dir(dir.path().join("ipns")).unwrap();
        let errors = service.into_completion().collect().await;
        assert!(matches!(
            errors.as_slice(),
            [ServiceError::MountLost { path }] if path.ends_with("ipns")
        ));
        node.close().await.unwrap();
    }

    #[tokio::test]
    async fn closing_the_node_unmounts_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let ipfs = dir.path().join("a");
        let ipns = dir.path().join("b");
        std::fs::create_dir(&ipfs).unwrap();
        std::fs::create_dir(&ipns).unwrap();
        let node = node_with_mounts(dir.path()).await;

        let service = MountLauncher::new(Some(ipfs), Some(ipns))
            .launch(&node)
            .await
            .unwrap();
        node.close().await.unwrap();
        assert!(service.into_completion().collect().await.is_empty());
    }
}
