//! node-daemon
//!
//! Runs a network node: locks its repository, builds the node, and serves
//! the control API, the gateway and (optionally) the mount until interrupted
//! or until a service fails.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                           NODE DAEMON                            │
//!   │                                                                  │
//!   │  ┌──────────┐   ┌──────────┐   ┌──────────────────────────────┐  │
//!   │  │   repo   │──▶│   node   │──▶│ service launchers            │  │
//!   │  │  + lock  │   │ builder  │   │  api │ gateway │ mount       │  │
//!   │  └──────────┘   └──────────┘   └──────┬───────┬───────┬───────┘  │
//!   │                                       │       │       │          │
//!   │                                       ▼       ▼       ▼          │
//!   │                                ┌──────────────────────────────┐  │
//!   │                                │  completion signals → merge  │  │
//!   │                                └──────────────┬───────────────┘  │
//!   │                                               ▼                  │
//!   │   SIGINT/SIGTERM ──▶ cancellation ──▶ shutdown coordinator       │
//!   │                                               │                  │
//!   │                                               ▼                  │
//!   │                                  node close → repo unlocked      │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::process::ExitCode;

use node_daemon::cli::DaemonArgs;
use node_daemon::config::load_config;
use node_daemon::lifecycle::{run_daemon, CancellationSignal};
use node_daemon::observability::logging;
use node_daemon::repo::CONFIG_FILE;

#[tokio::main]
async fn main() -> ExitCode {
    let args = DaemonArgs::parse();
    let options = args.to_options();

    // the repository is not locked yet, this only peeks at the log level
    let configured = load_config(&options.repo_dir.join(CONFIG_FILE))
        .map(|config| config.observability.log_level)
        .unwrap_or_else(|_| "info".to_string());
    logging::init(logging::filter(args.log_level.as_deref(), &configured));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        repo = %options.repo_dir.display(),
        routing = ?options.routing,
        "node-daemon starting"
    );

    let cancel = CancellationSignal::new();
    cancel.install_os_handlers();

    match run_daemon(options, cancel).await {
        Ok(outcome) => {
            tracing::info!(outcome = ?outcome, "Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
