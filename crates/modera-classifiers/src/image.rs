//! Image branch: synchronous moderation label detection

use async_trait::async_trait;
use modera_core::{Branch, ContentItem, Finding, FindingCategory, Outcome};
use std::sync::Arc;

use crate::adapter::{retain_confident, AnalysisParams, BranchTask, ClassifierAdapter};
use crate::backend::ImageModerationBackend;

pub struct ImageAdapter {
    backend: Arc<dyn ImageModerationBackend>,
}

impl ImageAdapter {
    pub fn new(backend: Arc<dyn ImageModerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ClassifierAdapter for ImageAdapter {
    fn branch(&self) -> Branch {
        Branch::Image
    }

    #[tracing::instrument(skip(self, item, params), fields(content_id = %item.content_id, branch = "image"))]
    async fn analyze(&self, item: &ContentItem, params: &AnalysisParams) -> BranchTask {
        let backend = &self.backend;
        let source = &item.source;
        let min_confidence = params.min_confidence_percent();

        let result = params
            .retry
            .run("detect_moderation_labels", move || {
                backend.detect_moderation_labels(source, min_confidence)
            })
            .await;

        let outcome = match result {
            Ok(labels) => {
                let findings = labels
                    .into_iter()
                    .map(|label| {
                        Finding::from_percent(
                            Branch::Image,
                            FindingCategory::Moderation,
                            label.name,
                            label.score,
                        )
                    })
                    .collect();
                let findings = retain_confident(findings, params.min_confidence);
                tracing::info!(findings = findings.len(), "Image moderation completed");
                Outcome::success(findings)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Image moderation failed");
                err.into_outcome()
            }
        };

        BranchTask::Immediate(outcome)
    }
}
