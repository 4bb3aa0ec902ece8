//! Prompt Routing Engine
//!
//! Maps free-text prompts to task identifiers by multi-pattern substring
//! matching against a reference set of canonical phrases.

// Core subsystems
pub mod config;
pub mod reference;
pub mod routing;

// Background work
pub mod recording;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::RouterConfig;
pub use lifecycle::{RouterRuntime, Shutdown};
pub use reference::{FileReferenceSource, ReferenceSource, StaticSource};
pub use routing::{MatcherMode, ReferenceItem, RouteResponse, RouteStatus, Router, RoutingResult};
