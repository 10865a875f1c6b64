//! Video branch: asynchronous moderation job, completed by the Job Poller

use async_trait::async_trait;
use modera_core::{Branch, ContentItem, Finding, FindingCategory};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::{
    retain_confident, AnalysisParams, BranchTask, ClassifierAdapter, JobStatus, JobStatusSource,
    PollableJob,
};
use crate::backend::{BackendError, ScoredLabel, VideoJobStatus, VideoModerationBackend};

pub struct VideoAdapter {
    backend: Arc<dyn VideoModerationBackend>,
}

impl VideoAdapter {
    pub fn new(backend: Arc<dyn VideoModerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ClassifierAdapter for VideoAdapter {
    fn branch(&self) -> Branch {
        Branch::Video
    }

    #[tracing::instrument(skip(self, item, params), fields(content_id = %item.content_id, branch = "video"))]
    async fn analyze(&self, item: &ContentItem, params: &AnalysisParams) -> BranchTask {
        let backend = &self.backend;
        let source = &item.source;
        let min_confidence = params.min_confidence_percent();

        let started = params
            .retry
            .run("start_content_moderation", move || {
                backend.start_moderation(source, min_confidence)
            })
            .await;

        match started {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, source = %item.source.s3_uri(), "Video moderation job started");
                BranchTask::Pollable(PollableJob {
                    branch: Branch::Video,
                    job_id,
                    source: Arc::new(VideoJobSource {
                        backend: self.backend.clone(),
                        min_confidence: params.min_confidence,
                    }),
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to start video moderation job");
                BranchTask::Immediate(err.into_outcome())
            }
        }
    }
}

/// Adapts backend job status to normalised findings
struct VideoJobSource {
    backend: Arc<dyn VideoModerationBackend>,
    min_confidence: f32,
}

#[async_trait]
impl JobStatusSource for VideoJobSource {
    async fn status(&self, job_id: &str) -> Result<JobStatus, BackendError> {
        Ok(match self.backend.job_status(job_id).await? {
            VideoJobStatus::InProgress => JobStatus::InProgress,
            VideoJobStatus::Failed(message) => JobStatus::Failed(message),
            VideoJobStatus::Succeeded(labels) => {
                JobStatus::Succeeded(collapse_labels(labels, self.min_confidence))
            }
        })
    }
}

/// One finding per label, keeping the highest confidence seen across the video
fn collapse_labels(labels: Vec<ScoredLabel>, min_confidence: f32) -> Vec<Finding> {
    let mut best: HashMap<String, f32> = HashMap::new();
    for label in labels {
        let entry = best.entry(label.name).or_insert(label.score);
        *entry = entry.max(label.score);
    }

    let findings = best
        .into_iter()
        .map(|(name, score)| {
            Finding::from_percent(Branch::Video, FindingCategory::Moderation, name, score)
        })
        .collect();
    retain_confident(findings, min_confidence)
}
