//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load `path` when given, otherwise validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = RouterConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "[routing]\nthreshold = 0.4\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.routing.threshold, 0.4);
    }

    #[test]
    fn test_errors_are_classified() {
        assert!(matches!(
            load_config(Path::new("/definitely/missing/router.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(parse_config("[routing"), Err(ConfigError::Parse(_))));

        let err = parse_config("[recorder]\npool_size = 0\nqueue_capacity = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: recorder.pool_size must be at least 1, recorder.queue_capacity must be at least 1"
        );
    }

    #[test]
    fn test_sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("router.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.routing.threshold, 0.55);
        assert!(!config.reference.watch);
    }

    #[test]
    fn test_default_when_no_path() {
        assert!(load_or_default(None).is_ok());
    }
}
