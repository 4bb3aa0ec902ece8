//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming prompt
//!     → router.rs (lazy single-flight init, then lock-free snapshot load)
//!     → matcher.rs (normalize, search via PatternMatcher)
//!     → types.rs (select best candidate)
//!     → router.rs (score = pattern chars / prompt chars, threshold)
//!     → Return: RoutingResult, also handed to the recorder
//!
//! Matcher Compilation (first use or after reinitialize):
//!     ReferenceSource → Vec<ReferenceItem>
//!     → automaton.rs (trie + failure links)
//!     → on BuildError: fallback.rs (substring scan)
//!     → Freeze as immutable MatcherSnapshot
//! ```
//!
//! # Design Decisions
//! - Matchers are compiled once and immutable at runtime
//! - Deterministic: longest match, then earliest start, then earliest item
//! - Automaton and fallback scanner produce identical candidates

pub mod automaton;
pub mod fallback;
pub mod matcher;
pub mod router;
pub mod types;

pub use automaton::{Automaton, BuildError};
pub use fallback::FallbackScanner;
pub use matcher::PatternMatcher;
pub use router::{evaluate, MatcherMode, MatcherSnapshot, Router};
pub use types::{MatchCandidate, ReferenceItem, RouteResponse, RouteStatus, RoutingResult};
