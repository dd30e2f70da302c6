//! Configuration for the remote-read query path.
//!
//! The YAML file is optional; every field falls back to a default, so an
//! empty file and no file at all behave the same.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_REQUEST_SIZE;
use crate::fanout::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_QUERY_TIMEOUT, FanOutOptions, PartialFailureMode,
};
use crate::storage::config::StorageConfig;

/// Error loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },
}

/// Root configuration.
///
/// ```yaml
/// port: 9090
/// max_request_size: 1048576
/// max_concurrency: 16
/// query_timeout_secs: 120
/// partial_failure_mode: all_or_nothing
/// storage:
///   type: InMemory
///   seed_file: ./seed.yaml
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteReadConfig {
    /// Port to listen on. Overridden by the `--port` flag when given.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Ceiling in bytes on both the compressed and the decompressed request
    /// body.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,

    /// Maximum sub-queries of one request running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Upper bound for a whole request in seconds. Zero disables the bound.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    #[serde(default)]
    pub partial_failure_mode: PartialFailureMode,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_port() -> u16 {
    9090
}

fn default_max_request_size() -> usize {
    DEFAULT_MAX_REQUEST_SIZE
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT.as_secs()
}

impl Default for RemoteReadConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_request_size: default_max_request_size(),
            max_concurrency: default_max_concurrency(),
            query_timeout_secs: default_query_timeout_secs(),
            partial_failure_mode: PartialFailureMode::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl RemoteReadConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_secs > 0).then(|| Duration::from_secs(self.query_timeout_secs))
    }

    pub fn fan_out_options(&self) -> FanOutOptions {
        FanOutOptions {
            max_concurrency: self.max_concurrency,
            query_timeout: self.query_timeout(),
            partial_failure_mode: self.partial_failure_mode,
        }
    }
}

/// Load configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RemoteReadConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_config(&contents).map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })
}

fn parse_config(contents: &str) -> Result<RemoteReadConfig, String> {
    // serde_yaml rejects an empty document for a struct
    if contents.trim().is_empty() {
        return Ok(RemoteReadConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::InMemoryStorageConfig;

    #[test]
    fn should_parse_full_config() {
        // given
        let yaml = r#"
port: 9191
max_request_size: 2048
max_concurrency: 4
query_timeout_secs: 30
partial_failure_mode: best_effort
storage:
  type: InMemory
  seed_file: /tmp/seed.yaml
"#;

        // when
        let config = parse_config(yaml).unwrap();

        // then
        assert_eq!(config.port, 9191);
        assert_eq!(config.max_request_size, 2048);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.partial_failure_mode, PartialFailureMode::BestEffort);
        assert_eq!(
            config.storage,
            StorageConfig::InMemory(InMemoryStorageConfig {
                seed_file: Some("/tmp/seed.yaml".to_string())
            })
        );
    }

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        // given
        let yaml = "max_concurrency: 2\n";

        // when
        let config = parse_config(yaml).unwrap();

        // then
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.port, 9090);
        assert_eq!(config.max_request_size, DEFAULT_MAX_REQUEST_SIZE);
        assert_eq!(config.partial_failure_mode, PartialFailureMode::AllOrNothing);
    }

    #[test]
    fn should_treat_empty_file_as_defaults() {
        // given/when
        let config = parse_config("  \n").unwrap();

        // then
        assert_eq!(config, RemoteReadConfig::default());
    }

    #[test]
    fn should_disable_timeout_when_zero() {
        // given
        let config = RemoteReadConfig {
            query_timeout_secs: 0,
            ..RemoteReadConfig::default()
        };

        // when
        let options = config.fan_out_options();

        // then
        assert_eq!(options.query_timeout, None);
    }

    #[test]
    fn should_reject_unknown_failure_mode() {
        // given
        let yaml = "partial_failure_mode: sometimes\n";

        // when
        let result = parse_config(yaml);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn should_report_missing_config_file() {
        // given/when
        let result = load_config("/nonexistent/remote-read.yaml");

        // then
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
