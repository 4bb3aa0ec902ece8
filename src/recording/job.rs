//! Recording job value object.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::routing::types::RoutingResult;

/// A routing outcome handed to the recorder.
///
/// Owned by the recorder once submitted; consumed by exactly one worker.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingJob {
    /// Correlation ID for logs.
    pub id: Uuid,
    /// Prompt as received, before normalization.
    pub prompt: String,
    pub result: RoutingResult,
    pub timestamp: DateTime<Utc>,
}

impl RecordingJob {
    pub fn new(prompt: impl Into<String>, result: RoutingResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            result,
            timestamp: Utc::now(),
        }
    }
}
