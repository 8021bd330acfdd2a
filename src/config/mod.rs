//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! <repo>/config.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NodeConfig (validated, immutable)
//!     → snapshot owned by the Node, shared read-only with services
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the node is built; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, save_config, ConfigError};
pub use schema::{
    AddressesConfig, GatewayConfig, IdentityConfig, MountsConfig, NodeConfig,
    ObservabilityConfig, SupernodeRoutingConfig,
};
pub use validation::ValidationError;
