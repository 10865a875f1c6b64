//! Bounded fan-in point for workflow runs
//!
//! Every ingested item runs as an independent task; a semaphore caps how
//! many run at once.

use modera_core::{AppError, ContentItem};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::orchestrator::{ModerationOrchestrator, WorkflowError, WorkflowRun};

#[derive(Clone)]
pub struct WorkflowDispatcher {
    orchestrator: Arc<ModerationOrchestrator>,
    permits: Arc<Semaphore>,
}

impl WorkflowDispatcher {
    pub fn new(orchestrator: Arc<ModerationOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Slots free for new runs right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `item` in the background, waiting for a free slot first.
    ///
    /// Failures are logged; they never affect other spawned runs. A verdict
    /// that could not be stored is logged in full.
    pub fn spawn(&self, item: ContentItem) -> JoinHandle<Result<WorkflowRun, AppError>> {
        let orchestrator = self.orchestrator.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!(content_id = %item.content_id, "Workflow semaphore closed");
                    return Err(AppError::Internal("Workflow semaphore closed".to_string()));
                }
            };

            orchestrator.run(item).await.map_err(|err| {
                let err = into_app_error(err);
                if let Some(record) = err.unpersisted_verdict() {
                    tracing::error!(
                        content_id = %record.content_id,
                        status = %record.final_status,
                        text_labels = ?record.text_labels,
                        image_labels = ?record.image_labels,
                        video_labels = ?record.video_labels,
                        severity_flags = ?record.severity_flags,
                        toxicity_flags = ?record.toxicity_flags,
                        branch_states = ?record.branch_states,
                        timestamp = %record.timestamp,
                        error = %err,
                        "Moderation verdict computed but not persisted"
                    );
                }
                err
            })
        })
    }

    /// Run `item` now, or fail with `Overloaded` when every slot is busy.
    ///
    /// A persistence failure returns the computed verdict inside the error.
    pub async fn run_now(&self, item: ContentItem) -> Result<WorkflowRun, AppError> {
        let _permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| AppError::Overloaded)?;

        self.orchestrator.run(item).await.map_err(into_app_error)
    }
}

fn into_app_error(err: WorkflowError) -> AppError {
    match err {
        WorkflowError::Persistence { verdict, source } => AppError::Persistence {
            verdict: Box::new(verdict.to_record()),
            message: source.to_string(),
        },
    }
}
