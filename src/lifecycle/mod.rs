//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Init (optional) → Lock repo → Build node → Launch services
//!
//! Fan-in (completion.rs):
//!     one CompletionSignal per service → merge → single signal
//!
//! Shutdown (shutdown.rs):
//!     first service error | all services done → Close node → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → CancellationSignal → node stops its children
//! ```
//!
//! # Design Decisions
//! - Ordered startup: lock, then node, then services
//! - The node is closed on every exit path once it exists
//! - Cancellation is cooperative; there is no forced-exit deadline

pub mod completion;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use completion::{completion_channel, merge, CompletionSender, CompletionSignal};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownState};
pub use signals::CancellationSignal;
pub use startup::{run_daemon, start, DaemonOptions, RoutingOption, RunningDaemon};
