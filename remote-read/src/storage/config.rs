//! Storage configuration types.
//!
//! The query path does not own a storage engine. For development and tests the
//! server runs against [`InMemoryStorage`](super::InMemoryStorage), optionally
//! preloaded from a YAML seed file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
///
/// Defaults to an empty in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StorageConfig {
    InMemory(InMemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::InMemory(InMemoryStorageConfig::default())
    }
}

/// In-memory storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InMemoryStorageConfig {
    /// Optional path to a YAML file of series to preload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,
}

/// Contents of a seed file.
///
/// ```yaml
/// series:
///   - labels: { __name__: up, job: api }
///     samples: [[1700000000000, 1.0], [1700000015000, 1.0]]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeedFile {
    #[serde(default)]
    pub series: Vec<SeedSeries>,
}

/// One series of a seed file; samples are `[timestamp_ms, value]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedSeries {
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub samples: Vec<(i64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_empty_in_memory_storage() {
        // given/when
        let config = StorageConfig::default();

        // then
        assert_eq!(
            config,
            StorageConfig::InMemory(InMemoryStorageConfig { seed_file: None })
        );
    }

    #[test]
    fn should_deserialize_in_memory_config_with_seed_file() {
        // given
        let yaml = "type: InMemory\nseed_file: /tmp/series.yaml";

        // when
        let config: StorageConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(
            config,
            StorageConfig::InMemory(InMemoryStorageConfig {
                seed_file: Some("/tmp/series.yaml".to_string())
            })
        );
    }

    #[test]
    fn should_deserialize_seed_file() {
        // given
        let yaml = r#"
series:
  - labels: { __name__: up, job: api }
    samples: [[10, 1.0], [20, 0.5]]
"#;

        // when
        let seed: SeedFile = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(seed.series.len(), 1);
        assert_eq!(seed.series[0].labels["job"], "api");
        assert_eq!(seed.series[0].samples, vec![(10, 1.0), (20, 0.5)]);
    }
}
