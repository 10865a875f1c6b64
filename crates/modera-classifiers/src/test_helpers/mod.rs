//! Test helpers for adapter unit tests
//!
//! Scripted backends so adapters and the poller can be tested without AWS.

use async_trait::async_trait;
use modera_core::SourceLocation;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapter::{JobStatus, JobStatusSource};
use crate::backend::{
    BackendError, ImageModerationBackend, ObjectReader, ScoredLabel, TextAnalysisBackend,
    VideoJobStatus, VideoModerationBackend,
};

type Script<T> = Arc<Mutex<VecDeque<Result<T, BackendError>>>>;

/// Pops the next scripted response; the last one repeats forever.
fn next<T: Clone>(script: &Script<T>) -> Result<T, BackendError> {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().expect("script must not be empty")
    }
}

fn script<T>(responses: Vec<Result<T, BackendError>>) -> Script<T> {
    Arc::new(Mutex::new(responses.into_iter().collect()))
}

/// Job status source that replays a fixed sequence of statuses
pub struct ScriptedJob {
    script: Script<JobStatus>,
    calls: AtomicU32,
}

impl ScriptedJob {
    pub fn new(responses: Vec<Result<JobStatus, BackendError>>) -> Self {
        Self {
            script: script(responses),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always(status: JobStatus) -> Self {
        Self::new(vec![Ok(status)])
    }

    pub fn always_err(err: BackendError) -> Self {
        Self::new(vec![Err(err)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusSource for ScriptedJob {
    async fn status(&self, _job_id: &str) -> Result<JobStatus, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next(&self.script)
    }
}

/// Text backend with independent PII and toxicity scripts
pub struct MockTextBackend {
    pii: Script<Vec<ScoredLabel>>,
    toxicity: Script<Vec<ScoredLabel>>,
    pub seen_text: Mutex<Vec<String>>,
}

impl MockTextBackend {
    pub fn new(
        pii: Vec<Result<Vec<ScoredLabel>, BackendError>>,
        toxicity: Vec<Result<Vec<ScoredLabel>, BackendError>>,
    ) -> Self {
        Self {
            pii: script(pii),
            toxicity: script(toxicity),
            seen_text: Mutex::new(Vec::new()),
        }
    }

    pub fn clean() -> Self {
        Self::new(vec![Ok(vec![])], vec![Ok(vec![])])
    }
}

#[async_trait]
impl TextAnalysisBackend for MockTextBackend {
    async fn detect_pii(
        &self,
        text: &str,
        _language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        self.seen_text.lock().unwrap().push(text.to_string());
        next(&self.pii)
    }

    async fn detect_toxicity(
        &self,
        _text: &str,
        _language_code: &str,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        next(&self.toxicity)
    }
}

pub struct MockImageBackend {
    script: Script<Vec<ScoredLabel>>,
    pub calls: AtomicU32,
    pub last_min_confidence: Mutex<Option<f32>>,
}

impl MockImageBackend {
    pub fn new(responses: Vec<Result<Vec<ScoredLabel>, BackendError>>) -> Self {
        Self {
            script: script(responses),
            calls: AtomicU32::new(0),
            last_min_confidence: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ImageModerationBackend for MockImageBackend {
    async fn detect_moderation_labels(
        &self,
        _source: &SourceLocation,
        min_confidence: f32,
    ) -> Result<Vec<ScoredLabel>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_min_confidence.lock().unwrap() = Some(min_confidence);
        next(&self.script)
    }
}

pub struct MockVideoBackend {
    start: Script<String>,
    status: Script<VideoJobStatus>,
}

impl MockVideoBackend {
    pub fn new(
        start: Vec<Result<String, BackendError>>,
        status: Vec<Result<VideoJobStatus, BackendError>>,
    ) -> Self {
        Self {
            start: script(start),
            status: script(status),
        }
    }
}

#[async_trait]
impl VideoModerationBackend for MockVideoBackend {
    async fn start_moderation(
        &self,
        _source: &SourceLocation,
        _min_confidence: f32,
    ) -> Result<String, BackendError> {
        next(&self.start)
    }

    async fn job_status(&self, _job_id: &str) -> Result<VideoJobStatus, BackendError> {
        next(&self.status)
    }
}

/// Object reader backed by a map of `bucket/key` to bytes
#[derive(Default)]
pub struct MockReader {
    objects: HashMap<String, Vec<u8>>,
}

impl MockReader {
    pub fn with_object(mut self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(format!("{}/{}", bucket, key), data.into());
        self
    }
}

#[async_trait]
impl ObjectReader for MockReader {
    async fn read(&self, source: &SourceLocation) -> Result<Vec<u8>, BackendError> {
        self.objects
            .get(&format!("{}/{}", source.bucket, source.key))
            .cloned()
            .ok_or_else(|| BackendError::InvalidInput(format!("Object not found: {}", source.key)))
    }
}
