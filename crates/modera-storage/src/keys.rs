//! Shared key generation for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Key under which an uploaded file is stored: `{content_id}/{filename}`.
///
/// Only the last path segment of `filename` is kept so a client cannot place
/// objects outside its content id prefix.
pub fn upload_key(content_id: &str, filename: &str) -> StorageResult<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidKey(format!(
            "Invalid filename: {:?}",
            filename
        )));
    }

    let key = format!("{}/{}", content_id, name);
    validate_key(&key)?;
    Ok(key)
}

/// Key of the verdict document in the results bucket: `{content_id}.json`.
pub fn verdict_key(content_id: &str) -> String {
    format!("{}.json", content_id)
}

/// Reject keys that could escape the bucket root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
