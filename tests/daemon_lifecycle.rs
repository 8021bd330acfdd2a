//! End-to-end lifecycle tests: locking, startup ordering, shutdown paths.

mod common;

use std::path::Path;

use node_daemon::lifecycle::{start, CancellationSignal, DaemonOptions, RoutingOption};
use node_daemon::lifecycle::{ShutdownOutcome, ShutdownState};
use node_daemon::net::ListenerError;
use node_daemon::node::BuildErrorKind;
use node_daemon::repo::{LockError, Repo, RepoError, RepoLock};
use node_daemon::service::{LaunchError, ServiceError, ServiceKind};
use node_daemon::{run_daemon, DaemonError};

use common::{base_url, client, init_repo, start_list_server, within};

fn assert_unlocked(root: &Path) {
    assert!(!RepoLock::is_locked(root).unwrap(), "repository still locked");
    Repo::open(root).unwrap().close().unwrap();
}

#[tokio::test]
async fn lock_passes_to_the_node_and_is_released_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |_| {});

    let cancel = CancellationSignal::new();
    let daemon = start(DaemonOptions::new(&root), cancel.clone()).await.unwrap();
    assert_eq!(daemon.state(), ShutdownState::Running);

    // a second daemon on the same repository is refused while the first runs
    let second = start(DaemonOptions::new(&root), CancellationSignal::new()).await;
    assert!(matches!(
        second,
        Err(DaemonError::Repo(RepoError::Lock(LockError::Held { .. })))
    ));

    cancel.fire();
    let outcome = within(daemon.wait()).await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);

    assert_unlocked(&root);
}

#[tokio::test]
async fn ephemeral_ports_are_resolved_and_served() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |_| {});

    let cancel = CancellationSignal::new();
    let daemon = start(DaemonOptions::new(&root), cancel.clone()).await.unwrap();

    let api = daemon.address(ServiceKind::Api).unwrap().clone();
    let gateway = daemon.address(ServiceKind::Gateway).unwrap().clone();
    assert!(!api.is_ephemeral());
    assert!(!gateway.is_ephemeral());
    assert_ne!(api, gateway);

    let response = client()
        .get(format!("{}/api/v0/id", base_url(api.socket_addr())))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let id: serde_json::Value = response.json().await.unwrap();
    assert_eq!(id["ID"], daemon.node().handle().peer_id());

    let response = client()
        .get(format!("{}/version", base_url(gateway.socket_addr())))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    cancel.fire();
    assert_eq!(within(daemon.wait()).await.unwrap(), ShutdownOutcome::Graceful);
}

#[tokio::test]
async fn api_bind_failure_stops_startup_and_releases_the_lock() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();
    let deny = start_list_server("QmRefused\n").await;

    let dir = tempfile::tempdir().unwrap();
    let deny_url = deny.url.clone();
    let root = init_repo(dir.path(), |config| {
        config.addresses.api = format!("/ip4/127.0.0.1/tcp/{}", port);
        config.gateway.deny_list = Some(deny_url);
    });

    let options = DaemonOptions {
        mount: true,
        ..DaemonOptions::new(&root)
    };
    let err = run_daemon(options, CancellationSignal::new()).await.unwrap_err();
    assert!(matches!(
        err,
        DaemonError::Launch(LaunchError::Listener {
            kind: ServiceKind::Api,
            source: ListenerError::Bind { .. },
        })
    ));
    assert!(err.is_setup());

    // the gateway never started, so its list was never fetched
    assert_eq!(deny.hits(), 0);
    assert_unlocked(&root);
}

#[tokio::test]
async fn build_failure_releases_the_lock() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |config| {
        config.addresses.swarm = vec![format!("/ip4/127.0.0.1/tcp/{}", port)];
    });

    let err = run_daemon(DaemonOptions::new(&root), CancellationSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Build(BuildErrorKind::Swarm(_))));
    assert_unlocked(&root);
}

#[tokio::test]
async fn bad_supernode_config_releases_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |config| {
        config.supernode_routing.servers = vec!["/ip4/10.0.0.1/tcp/4002".to_string()];
    });

    // unused servers are not an error under the default routing
    let cancel = CancellationSignal::new();
    let daemon = start(DaemonOptions::new(&root), cancel.clone()).await.unwrap();
    cancel.fire();
    within(daemon.wait()).await.unwrap();

    let options = DaemonOptions {
        routing: RoutingOption::Supernode,
        ..DaemonOptions::new(&root)
    };
    let err = run_daemon(options, CancellationSignal::new()).await.unwrap_err();
    assert!(matches!(err, DaemonError::RoutingPeer { .. }));
    assert_unlocked(&root);
}

#[tokio::test]
async fn supernode_routing_is_reported_by_the_node() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |config| {
        config.supernode_routing.servers =
            vec!["/ip4/10.0.0.1/tcp/4002/ipfs/QmSupernode".to_string()];
    });

    let cancel = CancellationSignal::new();
    let options = DaemonOptions {
        routing: RoutingOption::Supernode,
        disable_transport_encryption: true,
        ..DaemonOptions::new(&root)
    };
    let daemon = start(options, cancel.clone()).await.unwrap();
    let api = daemon.address(ServiceKind::Api).unwrap().socket_addr();

    let vars: serde_json::Value = client()
        .get(format!("{}/debug/vars", base_url(api)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(vars["routing"], "supernode");
    assert_eq!(vars["transport_encrypted"], false);

    cancel.fire();
    within(daemon.wait()).await.unwrap();
}

#[tokio::test]
async fn lost_mount_becomes_the_process_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |_| {});
    std::fs::create_dir(dir.path().join("ipfs")).unwrap();
    std::fs::create_dir(dir.path().join("ipns")).unwrap();

    let options = DaemonOptions {
        mount: true,
        ..DaemonOptions::new(&root)
    };
    let daemon = start(options, CancellationSignal::new()).await.unwrap();
    assert_eq!(daemon.endpoints().len(), 3);

    std::fs::remove_dir(dir.path().join("ipfs")).unwrap();
    let err = within(daemon.wait()).await.unwrap_err();
    assert!(matches!(err, DaemonError::Service(ServiceError::MountLost { .. })));
    assert!(!err.is_setup());

    // the API and gateway were torn down with the node
    assert_unlocked(&root);
}

#[tokio::test]
async fn missing_mount_point_fails_startup_after_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |_| {});

    let options = DaemonOptions {
        mount: true,
        mount_ipfs: Some(dir.path().join("nowhere")),
        ..DaemonOptions::new(&root)
    };
    let err = run_daemon(options, CancellationSignal::new()).await.unwrap_err();
    assert!(matches!(err, DaemonError::Launch(LaunchError::MountPoint { .. })));
    assert_unlocked(&root);
}

#[tokio::test]
async fn uninitialized_repository_is_refused_without_init() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("fresh");

    let err = run_daemon(DaemonOptions::new(&root), CancellationSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Repo(RepoError::NotInitialized { .. })));

    Repo::init(&root).unwrap();
    // keep the generated identity, move the listeners somewhere free
    let mut config = node_daemon::config::load_config(&root.join("config.toml")).unwrap();
    config.addresses.swarm = vec![common::LOCALHOST_EPHEMERAL.to_string()];
    config.addresses.api = common::LOCALHOST_EPHEMERAL.to_string();
    config.addresses.gateway = None;
    node_daemon::config::save_config(&root.join("config.toml"), &config).unwrap();

    let cancel = CancellationSignal::new();
    let options = DaemonOptions {
        init: true,
        ..DaemonOptions::new(&root)
    };
    let daemon = start(options, cancel.clone()).await.unwrap();
    assert_eq!(daemon.node().handle().peer_id(), config.identity.peer_id);
    assert!(daemon.address(ServiceKind::Gateway).is_none());

    cancel.fire();
    within(daemon.wait()).await.unwrap();
}

#[tokio::test]
async fn cancellation_during_startup_still_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |_| {});

    let cancel = CancellationSignal::new();
    cancel.fire();
    let outcome = within(run_daemon(DaemonOptions::new(&root), cancel)).await.unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_unlocked(&root);
}

#[tokio::test]
async fn empty_gateway_address_runs_only_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let root = init_repo(dir.path(), |config| {
        config.addresses.gateway = Some(String::new());
    });
    let written = std::fs::read_to_string(root.join("config.toml")).unwrap();
    assert!(written.contains("gateway = \"\""));

    let cancel = CancellationSignal::new();
    let daemon = start(DaemonOptions::new(&root), cancel.clone()).await.unwrap();
    assert_eq!(daemon.endpoints().len(), 1);
    assert!(daemon.address(ServiceKind::Api).is_some());
    assert!(daemon.address(ServiceKind::Gateway).is_none());

    cancel.fire();
    assert_eq!(within(daemon.wait()).await.unwrap(), ShutdownOutcome::Graceful);
    assert_unlocked(&root);
}
