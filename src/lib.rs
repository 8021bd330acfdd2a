//! Lifecycle orchestrator for a long-running network node.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod lifecycle;
pub mod net;
pub mod node;
pub mod observability;
pub mod repo;
pub mod service;

pub use config::schema::NodeConfig;
pub use error::DaemonError;
pub use lifecycle::{run_daemon, CancellationSignal, DaemonOptions, ShutdownOutcome};
pub use node::{Node, NodeBuilder, NodeHandle};
