use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Each bucket maps to a subdirectory of the configured base path.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `{base_path}/{bucket}`
    pub async fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> StorageResult<Self> {
        let bucket = bucket.into();
        validate_key(&bucket)?;
        if bucket.contains('/') {
            return Err(StorageError::ConfigError(format!(
                "Bucket name must not contain '/': {}",
                bucket
            )));
        }

        let root = base_path.into().join(&bucket);

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalStorage { root, bucket })
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        if key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.root.join(key))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // Write to a sibling temp file and rename so readers never see a partial object
        let mut tmp_name = path.clone().into_os_string();
        tmp_name.push(".partial");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", tmp_path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", tmp_path.display(), e))
        })?;

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move file into {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn presigned_put_url(
        &self,
        _key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::ConfigError(
            "Presigned upload URLs require the s3 storage backend".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "uploads").await.unwrap();

        storage
            .put("abc/notes.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();

        assert_eq!(storage.get("abc/notes.txt").await.unwrap(), b"hello".to_vec());
        assert!(dir.path().join("uploads/abc/notes.txt").exists());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "results").await.unwrap();

        storage.put("abc.json", b"{\"v\":1}".to_vec(), "application/json").await.unwrap();
        storage.put("abc.json", b"{\"v\":2}".to_vec(), "application/json").await.unwrap();

        assert_eq!(storage.get("abc.json").await.unwrap(), b"{\"v\":2}".to_vec());
        assert!(!dir.path().join("results/abc.json.partial").exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "uploads").await.unwrap();

        let result = storage.get("missing.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("missing.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "uploads").await.unwrap();

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_presign_unsupported() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "uploads").await.unwrap();

        let result = storage
            .presigned_put_url("abc/cat.png", "image/png", Duration::from_secs(300))
            .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
