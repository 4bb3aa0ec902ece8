//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → handed to lifecycle::startup
//!
//! On labels file change:
//!     watcher.rs detects change
//!     → unit message on reload channel
//!     → Router::refresh() (build aside, then swap)
//!     → routes in flight keep the old snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the threshold is fixed per router
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ObservabilityConfig, RecorderConfig, ReferenceConfig, RouterConfig, RoutingConfig, SinkConfig,
};
pub use validation::ValidationError;
