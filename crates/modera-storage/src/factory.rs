#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use modera_core::StorageConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Hands out bucket-scoped storage handles.
///
/// Ingestion events name arbitrary source buckets, so handles are created on
/// first use and cached per bucket.
pub struct StorageFactory {
    config: StorageConfig,
    cache: RwLock<HashMap<String, Arc<dyn Storage>>>,
}

impl StorageFactory {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.config.backend
    }

    /// Storage for the bucket that receives client uploads
    pub async fn uploads(&self) -> StorageResult<Arc<dyn Storage>> {
        let bucket = self.config.upload_bucket.clone();
        self.storage_for(&bucket).await
    }

    /// Storage for the bucket that holds verdict documents
    pub async fn results(&self) -> StorageResult<Arc<dyn Storage>> {
        let bucket = self.config.results_bucket.clone();
        self.storage_for(&bucket).await
    }

    pub async fn storage_for(&self, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
        if bucket.trim().is_empty() {
            return Err(StorageError::ConfigError("Bucket name is empty".to_string()));
        }

        {
            let cache = self.cache.read().await;
            if let Some(storage) = cache.get(bucket) {
                return Ok(storage.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(storage) = cache.get(bucket) {
            return Ok(storage.clone());
        }

        let storage = self.create(bucket).await?;
        tracing::debug!(
            bucket = %bucket,
            backend = %self.config.backend,
            "Created storage handle"
        );
        cache.insert(bucket.to_string(), storage.clone());
        Ok(storage)
    }

    async fn create(&self, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
        match self.config.backend {
            #[cfg(feature = "storage-s3")]
            StorageBackend::S3 => {
                let storage = S3Storage::new(
                    bucket.to_string(),
                    self.config.aws_region.clone(),
                    self.config.s3_endpoint.clone(),
                )?;
                Ok(Arc::new(storage))
            }

            #[cfg(not(feature = "storage-s3"))]
            StorageBackend::S3 => Err(StorageError::ConfigError(
                "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
            )),

            #[cfg(feature = "storage-local")]
            StorageBackend::Local => {
                let base_path = self.config.local_storage_path.clone().ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
                })?;
                let storage = LocalStorage::new(base_path, bucket).await?;
                Ok(Arc::new(storage))
            }

            #[cfg(not(feature = "storage-local"))]
            StorageBackend::Local => Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            )),
        }
    }
}
