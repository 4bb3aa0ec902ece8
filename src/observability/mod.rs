//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, Recorder, lifecycle produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr log output
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted messages
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
