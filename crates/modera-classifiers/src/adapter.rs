//! Adapter contract and the uniform completion abstraction

use async_trait::async_trait;
use modera_core::{Branch, ContentItem, Finding, Outcome};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendError;
use crate::poller::JobPoller;
use crate::retry::RetryPolicy;

/// Per-branch analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    /// Findings below this confidence (0..1) are dropped
    pub min_confidence: f32,
    pub language_code: String,
    pub retry: RetryPolicy,
}

impl AnalysisParams {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
            language_code: "en".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_language_code(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Same threshold on the 0..100 scale some backends use
    pub fn min_confidence_percent(&self) -> f32 {
        self.min_confidence * 100.0
    }
}

/// Status of a submitted job as reported by its backend
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    InProgress,
    Succeeded(Vec<Finding>),
    Failed(String),
}

/// Something that can report the status of a job by id
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn status(&self, job_id: &str) -> Result<JobStatus, BackendError>;
}

/// A submitted job whose result must be polled for
#[derive(Clone)]
pub struct PollableJob {
    pub branch: Branch,
    pub job_id: String,
    pub source: Arc<dyn JobStatusSource>,
}

impl Debug for PollableJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PollableJob")
            .field("branch", &self.branch)
            .field("job_id", &self.job_id)
            .finish()
    }
}

/// What an adapter hands back: either a finished outcome or a job to poll
#[derive(Debug)]
pub enum BranchTask {
    Immediate(Outcome),
    Pollable(PollableJob),
}

impl BranchTask {
    /// Drive the task to its terminal outcome.
    pub async fn resolve(self, poller: &JobPoller, cancel: CancellationToken) -> Outcome {
        match self {
            BranchTask::Immediate(outcome) => outcome,
            BranchTask::Pollable(job) => poller.poll(job, cancel).await,
        }
    }
}

/// Classifier adapter trait
///
/// One adapter per branch. `analyze` never returns an error: every failure
/// is folded into a `Failed` outcome so sibling branches are unaffected.
#[async_trait]
pub trait ClassifierAdapter: Send + Sync {
    fn branch(&self) -> Branch;

    async fn analyze(&self, item: &ContentItem, params: &AnalysisParams) -> BranchTask;
}

/// Drop findings under the threshold and order them by label, then
/// confidence descending, then category.
pub(crate) fn retain_confident(mut findings: Vec<Finding>, min_confidence: f32) -> Vec<Finding> {
    findings.retain(|f| f.confidence >= min_confidence);
    findings.sort_by(|a, b| {
        a.label
            .cmp(&b.label)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.category.cmp(&b.category))
    });
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use modera_core::FindingCategory;
    use std::time::Duration;

    #[test]
    fn test_retain_confident_filters_and_orders() {
        let findings = vec![
            Finding::new(Branch::Text, FindingCategory::Toxicity, "PROFANITY", 0.9),
            Finding::new(Branch::Text, FindingCategory::Toxicity, "INSULT", 0.6),
            Finding::new(Branch::Text, FindingCategory::Toxicity, "INSULT", 0.8),
            Finding::new(Branch::Text, FindingCategory::Toxicity, "GRAPHIC", 0.2),
        ];

        let kept = retain_confident(findings, 0.5);
        let labels: Vec<_> = kept.iter().map(|f| (f.label.as_str(), f.confidence)).collect();
        assert_eq!(
            labels,
            vec![("INSULT", 0.8), ("INSULT", 0.6), ("PROFANITY", 0.9)]
        );
    }

    #[test]
    fn test_retain_confident_breaks_ties_on_category() {
        let findings = vec![
            Finding::new(Branch::Text, FindingCategory::Toxicity, "NAME", 0.7),
            Finding::new(Branch::Text, FindingCategory::Pii, "NAME", 0.7),
        ];

        let categories: Vec<_> = retain_confident(findings, 0.5)
            .into_iter()
            .map(|f| f.category)
            .collect();
        assert_eq!(
            categories,
            vec![FindingCategory::Pii, FindingCategory::Toxicity]
        );
    }

    #[test]
    fn test_params_clamp_and_scale() {
        let params = AnalysisParams::new(1.4);
        assert_eq!(params.min_confidence, 1.0);
        assert_eq!(AnalysisParams::new(0.7).min_confidence_percent().round(), 70.0);
    }

    #[tokio::test]
    async fn test_immediate_task_resolves_without_polling() {
        let poller = JobPoller::new(Duration::from_secs(5), Duration::from_secs(60));
        let outcome = BranchTask::Immediate(Outcome::success(vec![]))
            .resolve(&poller, CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::success(vec![]));
    }
}
