//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured address string
//!     → multiaddr.rs (parse /ip4|ip6/<addr>/tcp/<port>[/ipfs/<peer>])
//!     → listener.rs (bind, resolve ephemeral port)
//!     → hand off to the HTTP layer or the swarm accept loop
//! ```
//!
//! # Design Decisions
//! - Binding is awaited to completion before the caller moves on
//! - The resolved address, not the requested one, is what gets reported

pub mod listener;
pub mod multiaddr;

pub use listener::{Listener, ListenerError};
pub use multiaddr::{AddrError, Multiaddr};
