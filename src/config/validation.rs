//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold in [0,1], pool and queue sizes > 0)
//! - Check cross-field requirements (watching needs a labels file)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RouterConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("routing.threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("recorder.pool_size must be at least 1")]
    EmptyPool,

    #[error("recorder.queue_capacity must be at least 1")]
    EmptyQueue,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("reference.watch requires reference.labels_path")]
    WatchWithoutLabels,

    #[error("sink.{0} must not be empty when the sink is enabled")]
    EmptySinkPath(&'static str),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let threshold = config.routing.threshold;
    if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
        errors.push(ValidationError::ThresholdOutOfRange(threshold));
    }

    if config.recorder.pool_size == 0 {
        errors.push(ValidationError::EmptyPool);
    }
    if config.recorder.queue_capacity == 0 {
        errors.push(ValidationError::EmptyQueue);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(obs.log_level.clone()));
    }

    if config.reference.watch && config.reference.labels_path.is_none() {
        errors.push(ValidationError::WatchWithoutLabels);
    }

    if config.sink.enabled {
        if config.sink.verified_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptySinkPath("verified_path"));
        }
        if config.sink.failure_path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptySinkPath("failure_path"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
