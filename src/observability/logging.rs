//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the filter: explicit override, then `RUST_LOG`, then the config
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Plain fmt output; the daemon is usually run in a terminal

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Choose the filter directive.
///
/// `explicit` wins (a command-line flag), then `RUST_LOG`, then `configured`.
pub fn filter(explicit: Option<&str>, configured: &str) -> EnvFilter {
    if let Some(directive) = explicit {
        return EnvFilter::new(directive);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directive_wins() {
        let filter = filter(Some("node_daemon=trace"), "info");
        assert_eq!(filter.to_string(), "node_daemon=trace");
    }

    #[test]
    fn second_init_is_refused() {
        init(EnvFilter::new("warn"));
        assert!(!init(EnvFilter::new("warn")));
    }
}
