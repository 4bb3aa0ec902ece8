//! Recording subsystem.
//!
//! # Data Flow
//! ```text
//! Router.route() builds RecordingJob
//!     → recorder.rs submit() (try_send, drop when full)
//!     → bounded queue
//!     → worker thread (one per job)
//!     → sink.rs (CSV logs, or tracing event)
//!
//! Shutdown:
//!     stop accepting → drain until grace deadline → discard remainder
//! ```
//!
//! # Design Decisions
//! - Recording never influences routing latency or results
//! - Best effort: jobs may be lost on crash or under saturation
//! - No retry and no dead-letter queue

pub mod job;
pub mod recorder;
pub mod sink;

pub use job::RecordingJob;
pub use recorder::{Recorder, RecorderStats, ShutdownReport};
pub use sink::{CsvResultSink, LogSink, ResultSink, SinkError};
