//! Storage factory for creating a [`Queryable`] from configuration.

use std::path::Path;
use std::sync::Arc;

use super::config::{SeedFile, StorageConfig};
use super::in_memory::InMemoryStorage;
use super::{Queryable, StorageError, StorageResult};
use crate::model::{Labels, Sample};

/// Creates a storage instance based on the provided configuration.
///
/// # Errors
///
/// Returns `StorageError::Storage` if a configured seed file cannot be read
/// or parsed.
pub fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Queryable>> {
    match config {
        StorageConfig::InMemory(in_memory) => {
            let storage = InMemoryStorage::new();
            if let Some(path) = &in_memory.seed_file {
                let seed = load_seed_file(path)?;
                seed_storage(&storage, seed);
                tracing::info!(
                    "Loaded {} series from seed file {}",
                    storage.series_count(),
                    path
                );
            }
            Ok(Arc::new(storage))
        }
    }
}

/// Reads and parses a YAML seed file.
pub fn load_seed_file<P: AsRef<Path>>(path: P) -> StorageResult<SeedFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        StorageError::Storage(format!(
            "Failed to read seed file '{}': {}",
            path.display(),
            e
        ))
    })?;
    serde_yaml::from_str(&contents).map_err(|e| {
        StorageError::Storage(format!(
            "Failed to parse seed file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Appends every series of a seed file to the storage.
pub fn seed_storage(storage: &InMemoryStorage, seed: SeedFile) {
    for series in seed.series {
        let labels = Labels::from_pairs(series.labels);
        let samples = series
            .samples
            .into_iter()
            .map(|(timestamp_ms, value)| Sample::new(timestamp_ms, value));
        storage.append(labels, samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::{InMemoryStorageConfig, SeedSeries};

    #[test]
    fn should_seed_storage_from_seed_file_contents() {
        // given
        let storage = InMemoryStorage::new();
        let seed = SeedFile {
            series: vec![
                SeedSeries {
                    labels: [("__name__".to_string(), "up".to_string())].into(),
                    samples: vec![(10, 1.0)],
                },
                SeedSeries {
                    labels: [("__name__".to_string(), "down".to_string())].into(),
                    samples: vec![],
                },
            ],
        };

        // when
        seed_storage(&storage, seed);

        // then
        assert_eq!(storage.series_count(), 2);
    }

    #[test]
    fn should_fail_on_missing_seed_file() {
        // given
        let config = StorageConfig::InMemory(InMemoryStorageConfig {
            seed_file: Some("/nonexistent/remote-read-seed.yaml".to_string()),
        });

        // when
        let result = create_storage(&config);

        // then
        match result {
            Err(StorageError::Storage(msg)) => assert!(msg.contains("Failed to read seed file")),
            _ => panic!("expected storage error"),
        }
    }

    #[test]
    fn should_create_empty_storage_by_default() {
        // given/when
        let result = create_storage(&StorageConfig::default());

        // then
        assert!(result.is_ok());
    }
}
