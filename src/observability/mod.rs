//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → /debug/metrics/prometheus on the control API (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Operator-facing lines (listening addresses, shutdown) go to stdout as
//!   plain text; everything else is a structured event
//! - Request ID flows through every HTTP span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
