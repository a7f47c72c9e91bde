//! Store factory for creating store instances

use std::sync::Arc;

use super::backends::{FileStore, MemoryStore};
#[cfg(feature = "s3")]
use super::backends::S3Store;
use super::config::{BackendType, StoreConfig};
use super::error::{StoreError, StoreResult};
use super::traits::ObjectStore;

/// Factory for creating store instances
pub struct StoreFactory;

impl StoreFactory {
    /// Create a store from explicit configuration
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn ObjectStore>> {
        match config.backend {
            BackendType::File => {
                let backend = FileStore::new(config).await?;
                Ok(Arc::new(backend))
            }
            BackendType::Memory => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "s3")]
            BackendType::S3 => {
                let backend = S3Store::new(config).await?;
                Ok(Arc::new(backend))
            }
            #[cfg(not(feature = "s3"))]
            BackendType::S3 => Err(StoreError::configuration(
                "S3 backend not enabled. Enable with --features s3",
            )),
        }
    }

    /// Create an in-memory store for tests
    pub fn memory() -> Arc<dyn ObjectStore> {
        Arc::new(MemoryStore::new())
    }

    /// Reject configurations that cannot produce a store
    pub fn validate(config: &StoreConfig) -> StoreResult<()> {
        if config.bucket.trim().is_empty() {
            return Err(StoreError::configuration("bucket name must not be empty"));
        }
        if config.backend == BackendType::File && config.file.root.as_os_str().is_empty() {
            return Err(StoreError::configuration("file store root must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_factory_builds_file_store() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::default();
        config.file.root = dir.path().to_path_buf();

        let store = StoreFactory::from_config(&config).await.unwrap();
        assert_eq!(store.backend_name(), "file");
        assert!(dir.path().join("chaos-templates").is_dir());
    }

    #[tokio::test]
    async fn test_factory_builds_memory_store() {
        let config = StoreConfig {
            backend: BackendType::Memory,
            ..Default::default()
        };
        let store = StoreFactory::from_config(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let config = StoreConfig {
            bucket: " ".to_string(),
            ..Default::default()
        };
        assert!(StoreFactory::validate(&config).is_err());
    }
}
