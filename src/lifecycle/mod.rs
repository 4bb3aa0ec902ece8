//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Sink → Recorder → ReferenceSource → Router → Preload
//!
//! Reload (startup.rs, when reference.watch is set):
//!     labels file change → Router::refresh() off the async runtime
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop reading input → drain recorder → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: sink first so the recorder never sees a missing sink
//! - Ordered shutdown: stop input, stop reload, drain recorder
//! - Shutdown has a timeout: recorder workers are detached after the grace

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{RouterRuntime, StartupError};
