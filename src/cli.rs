//! Command-line arguments for `node-daemon`.

use clap::Parser;
use std::path::PathBuf;

use crate::lifecycle::startup::{DaemonOptions, RoutingOption};

/// Directory name used under `$HOME` when no repository is given.
pub const DEFAULT_REPO_DIR: &str = ".node-daemon";

#[derive(Debug, Parser)]
#[command(name = "node-daemon", version)]
#[command(about = "Run a network-connected node", long_about = None)]
pub struct DaemonArgs {
    /// Repository root [default: $HOME/.node-daemon]
    #[arg(long, env = "NODE_DAEMON_PATH", value_name = "PATH")]
    pub repo_dir: Option<PathBuf>,

    /// Initialize the repository with default settings if it does not exist
    #[arg(long)]
    pub init: bool,

    /// Routing mode
    #[arg(long, value_enum, default_value_t = RoutingOption::Dht)]
    pub routing: RoutingOption,

    /// Mount the content filesystems
    #[arg(long)]
    pub mount: bool,

    /// Enable writing objects through the gateway (overrides the config)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub writable: Option<bool>,

    /// Path for the content mount point (overrides the config)
    #[arg(long, value_name = "PATH")]
    pub mount_ipfs: Option<PathBuf>,

    /// Path for the name mount point (overrides the config)
    #[arg(long, value_name = "PATH")]
    pub mount_ipns: Option<PathBuf>,

    /// Allow the control API to serve any content
    #[arg(long)]
    pub unrestricted_api: bool,

    /// Disable transport encryption (for debugging protocols)
    #[arg(long)]
    pub disable_transport_encryption: bool,

    /// Log filter directive, e.g. `node_daemon=debug` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl DaemonArgs {
    /// The repository root to use.
    pub fn repo_dir(&self) -> PathBuf {
        self.repo_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(DEFAULT_REPO_DIR)
        })
    }

    pub fn to_options(&self) -> DaemonOptions {
        DaemonOptions {
            repo_dir: self.repo_dir(),
            init: self.init,
            routing: self.routing,
            mount: self.mount,
            writable: self.writable,
            mount_ipfs: self.mount_ipfs.clone(),
            mount_ipns: self.mount_ipns.clone(),
            unrestricted_api: self.unrestricted_api,
            disable_transport_encryption: self.disable_transport_encryption,
        }
    }
}
