//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! bound Listener (net)
//!     → options.rs (ordered serve options → axum Router)
//!     → request.rs (request ID, trace span) when the Logging option is set
//!     → handlers.rs / gateway.rs
//!     → response
//! ```

pub mod gateway;
pub mod handlers;
pub mod options;
pub mod request;

pub use gateway::GatewayOptions;
pub use options::{build_router, ServeOption};
pub use request::{RequestIdExt, RequestIdGenerator, X_REQUEST_ID};
