//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum score for accepting a match.
pub const DEFAULT_THRESHOLD: f64 = 0.55;

/// Root configuration for the prompt router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Scoring and initialization policy.
    pub routing: RoutingConfig,

    /// Where reference phrases come from.
    pub reference: ReferenceConfig,

    /// Background recorder pool.
    pub recorder: RecorderConfig,

    /// Persistence of routing outcomes.
    pub sink: SinkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Routing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Minimum score (matched length / prompt length) to accept a match.
    pub threshold: f64,

    /// Build the matcher at startup instead of on the first route call.
    pub preload: bool,

    /// Run the preload on a background thread.
    pub background_preload: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            preload: true,
            background_preload: true,
        }
    }
}

/// Reference data configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Optional CSV of labeled prompts (`prompt`/`pattern`, `task`/`label`).
    pub labels_path: Option<PathBuf>,

    /// Append the canonical prompt table after labeled prompts.
    pub include_builtin: bool,

    /// Rebuild the matcher when the labels file changes.
    pub watch: bool,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            labels_path: Some(PathBuf::from("data/prompt_labels.csv")),
            include_builtin: true,
            watch: false,
        }
    }
}

/// Recorder pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Number of worker threads.
    pub pool_size: usize,

    /// Maximum pending jobs before submissions are dropped.
    pub queue_capacity: usize,

    /// How long shutdown waits for in-flight jobs, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl RecorderConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: 1024,
            shutdown_grace_ms: 2000,
        }
    }
}

/// Result sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Persist outcomes to CSV logs. When disabled they are only logged.
    pub enabled: bool,

    /// Log of successfully routed prompts.
    pub verified_path: PathBuf,

    /// Log of prompts that were not routed.
    pub failure_path: PathBuf,

    /// Value of the `source` column.
    pub source_tag: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verified_path: PathBuf::from("data/verified_prompts.csv"),
            failure_path: PathBuf::from("data/failure_prompts.csv"),
            source_tag: "router".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.routing.threshold, 0.55);
        assert_eq!(config.recorder.pool_size, 4);
        assert_eq!(config.recorder.shutdown_grace(), Duration::from_secs(2));
        assert!(config.reference.include_builtin);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RouterConfig = toml::from_str(
            r#"
            [routing]
            threshold = 0.3

            [recorder]
            queue_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.routing.threshold, 0.3);
        assert!(config.routing.preload);
        assert_eq!(config.recorder.queue_capacity, 8);
        assert_eq!(config.recorder.pool_size, 4);
        assert_eq!(config.sink.source_tag, "router");
    }
}
