//! Classifier backend capabilities
//!
//! Backends are constructed once at startup and injected into adapters.
//! Scores keep the backend's native scale; adapters normalise them.

use async_trait::async_trait;
use modera_core::{Outcome, SourceLocation};
use modera_storage::{StorageError, StorageFactory};
use thiserror::Error;

/// A label and its backend score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLabel {
    pub name: String,
    pub score: f32,
}

impl ScoredLabel {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Backend call errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Throttling, service unavailability, timeouts. Worth retrying.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Validation, access denied and other errors that retrying won't fix
    #[error("Permanent backend error: {0}")]
    Permanent(String),

    /// The content itself was rejected (missing object, oversized, undecodable)
    #[error("Invalid content: {0}")]
    InvalidInput(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }

    /// Terminal branch outcome for an error that exhausted its retries
    pub fn into_outcome(self) -> Outcome {
        match self {
            BackendError::InvalidInput(msg) => Outcome::input_error(msg),
            BackendError::Transient(msg) | BackendError::Permanent(msg) => {
                Outcome::backend_error(msg)
            }
        }
    }
}

impl From<StorageError> for BackendError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                BackendError::InvalidInput(format!("Object not found: {}", key))
            }
            StorageError::InvalidKey(msg) => BackendError::InvalidInput(msg),
            StorageError::ConfigError(msg) => BackendError::Permanent(msg),
            other if other.is_transient() => BackendError::Transient(other.to_string()),
            other => BackendError::Permanent(other.to_string()),
        }
    }
}

/// Text analysis: PII entity detection and toxicity scoring. Scores are 0..1.
#[async_trait]
pub trait TextAnalysisBackend: Send + Sync {
    async fn detect_pii(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError>;

    async fn detect_toxicity(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError>;
}

/// Synchronous image moderation. Scores and `min_confidence` are 0..100.
#[async_trait]
pub trait ImageModerationBackend: Send + Sync {
    async fn detect_moderation_labels(
        &self,
        source: &SourceLocation,
        min_confidence: f32,
    ) -> Result<Vec<ScoredLabel>, BackendError>;
}

/// State of an asynchronous video moderation job
#[derive(Debug, Clone, PartialEq)]
pub enum VideoJobStatus {
    InProgress,
    /// All result pages, in backend order. May repeat labels across timestamps.
    Succeeded(Vec<ScoredLabel>),
    Failed(String),
}

/// Asynchronous video moderation. Scores and `min_confidence` are 0..100.
#[async_trait]
pub trait VideoModerationBackend: Send + Sync {
    /// Start a job and return its id
    async fn start_moderation(
        &self,
        source: &SourceLocation,
        min_confidence: f32,
    ) -> Result<String, BackendError>;

    async fn job_status(&self, job_id: &str) -> Result<VideoJobStatus, BackendError>;
}

/// Raw object access for adapters that analyse bytes themselves
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn read(&self, source: &SourceLocation) -> Result<Vec<u8>, BackendError>;
}

#[async_trait]
impl ObjectReader for StorageFactory {
    async fn read(&self, source: &SourceLocation) -> Result<Vec<u8>, BackendError> {
        let storage = self.storage_for(&source.bucket).await?;
        Ok(storage.get(&source.key).await?)
    }
}
