//! Shared utilities for the integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use node_daemon::config::NodeConfig;
use node_daemon::repo::Repo;

pub const LOCALHOST_EPHEMERAL: &str = "/ip4/127.0.0.1/tcp/0";

/// Initialize a repository under `dir/repo` with every listener on an
/// ephemeral localhost port, then apply `configure`.
pub fn init_repo(dir: &Path, configure: impl FnOnce(&mut NodeConfig)) -> PathBuf {
    let root = dir.join("repo");
    let mut config = NodeConfig::default();
    config.addresses.swarm = vec![LOCALHOST_EPHEMERAL.to_string()];
    config.addresses.api = LOCALHOST_EPHEMERAL.to_string();
    config.addresses.gateway = Some(LOCALHOST_EPHEMERAL.to_string());
    config.mounts.ipfs = dir.join("ipfs").display().to_string();
    config.mounts.ipns = dir.join("ipns").display().to_string();
    config.mounts.check_interval_ms = 10;
    configure(&mut config);
    Repo::init_with(&root, config).unwrap();
    root
}

/// HTTP client that talks to localhost directly and leaves redirects alone.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// `http://` base URL for a bound socket.
#[allow(dead_code)]
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// A mock list server returning `body` for every request.
#[allow(dead_code)]
pub struct ListServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ListServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock list server that answers every request with `body`.
#[allow(dead_code)]
pub async fn start_list_server(body: &'static str) -> ListServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    ListServer {
        url: format!("http://{}/list", addr),
        hits,
    }
}

/// Start a list server that accepts connections but never answers.
#[allow(dead_code)]
pub async fn start_stalled_list_server() -> ListServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            open.push(socket);
        }
    });

    ListServer {
        url: format!("http://{}/list", addr),
        hits,
    }
}

/// Wait for `future` or fail the test after a few seconds.
#[allow(dead_code)]
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
