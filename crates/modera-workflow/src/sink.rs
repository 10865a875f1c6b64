//! Result Sinks
//!
//! Persist verdict records keyed by content id. Every sink overwrites on
//! re-delivery, so writing the same record twice leaves one stored record.

use async_trait::async_trait;
use modera_classifiers::{RetryPolicy, Retryable};
use modera_core::{AppError, VerdictRecord};
use modera_db::VerdictRepository;
use modera_storage::keys::verdict_key;
use modera_storage::{Storage, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AppError> for SinkError {
    fn from(err: AppError) -> Self {
        SinkError::Database(err.detailed_message())
    }
}

impl Retryable for SinkError {
    fn is_transient(&self) -> bool {
        match self {
            SinkError::Storage(err) => err.is_transient(),
            SinkError::Database(_) => true,
            SinkError::Serialization(_) => false,
        }
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store `record`, replacing any earlier record for the same content id
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError>;
}

#[async_trait]
pub trait VerdictLookup: Send + Sync {
    async fn get(&self, content_id: &str) -> Result<Option<VerdictRecord>, SinkError>;
}

/// Writes `{content_id}.json` to the results bucket
pub struct ObjectStoreSink {
    storage: Arc<dyn Storage>,
}

impl ObjectStoreSink {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ResultSink for ObjectStoreSink {
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError> {
        let body = serde_json::to_vec_pretty(record)?;
        self.storage
            .put(&verdict_key(&record.content_id), body, "application/json")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VerdictLookup for ObjectStoreSink {
    async fn get(&self, content_id: &str) -> Result<Option<VerdictRecord>, SinkError> {
        match self.storage.get(&verdict_key(content_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Upserts into the `moderation_verdicts` table
pub struct DatabaseSink {
    repository: VerdictRepository,
}

impl DatabaseSink {
    pub fn new(repository: VerdictRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ResultSink for DatabaseSink {
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError> {
        Ok(self.repository.upsert(record).await?)
    }
}

#[async_trait]
impl VerdictLookup for DatabaseSink {
    async fn get(&self, content_id: &str) -> Result<Option<VerdictRecord>, SinkError> {
        Ok(self
            .repository
            .get(content_id)
            .await?
            .map(|stored| stored.record))
    }
}

/// Object store first, then the record store
pub struct DualSink {
    object_store: Arc<dyn ResultSink>,
    record_store: Arc<dyn ResultSink>,
}

impl DualSink {
    pub fn new(object_store: Arc<dyn ResultSink>, record_store: Arc<dyn ResultSink>) -> Self {
        Self {
            object_store,
            record_store,
        }
    }
}

#[async_trait]
impl ResultSink for DualSink {
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError> {
        self.object_store.put(record).await?;
        self.record_store.put(record).await
    }
}

/// Process-local sink for tests and local development
#[derive(Default)]
pub struct InMemorySink {
    records: RwLock<HashMap<String, VerdictRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for InMemorySink {
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| SinkError::Database("in-memory sink lock poisoned".to_string()))?;
        records.insert(record.content_id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl VerdictLookup for InMemorySink {
    async fn get(&self, content_id: &str) -> Result<Option<VerdictRecord>, SinkError> {
        let records = self
            .records
            .read()
            .map_err(|_| SinkError::Database("in-memory sink lock poisoned".to_string()))?;
        Ok(records.get(content_id).cloned())
    }
}

/// Retries transient sink failures with bounded exponential backoff
pub struct RetryingSink {
    inner: Arc<dyn ResultSink>,
    policy: RetryPolicy,
}

impl RetryingSink {
    pub fn new(inner: Arc<dyn ResultSink>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ResultSink for RetryingSink {
    #[tracing::instrument(skip(self, record), fields(content_id = %record.content_id))]
    async fn put(&self, record: &VerdictRecord) -> Result<(), SinkError> {
        let inner = &self.inner;
        self.policy
            .run("persist_verdict", move || inner.put(record))
            .await
    }
}
