//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (routes, builds, recordings, queue depth)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `prompt_router_routes_total` (counter): routing calls by status, mode
//! - `prompt_router_builds_total` (counter): matcher builds by mode
//! - `prompt_router_build_duration_seconds` (histogram): build latency
//! - `prompt_router_reference_patterns` (gauge): patterns in the active matcher
//! - `prompt_router_recordings_total` (counter): recorder events by outcome
//! - `prompt_router_recorder_queue_depth` (gauge): pending recording jobs
//!
//! # Design Decisions
//! - Helpers are no-ops until a recorder is installed
//! - Labels are static strings only

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_route(status: &'static str, mode: &'static str) {
    counter!("prompt_router_routes_total", "status" => status, "mode" => mode).increment(1);
}

pub fn record_build(mode: &'static str, duration: Duration, patterns: usize) {
    counter!("prompt_router_builds_total", "mode" => mode).increment(1);
    histogram!("prompt_router_build_duration_seconds").record(duration.as_secs_f64());
    gauge!("prompt_router_reference_patterns").set(patterns as f64);
}

pub fn record_recording(outcome: &'static str) {
    counter!("prompt_router_recordings_total", "outcome" => outcome).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("prompt_router_recorder_queue_depth").set(depth as f64);
}
