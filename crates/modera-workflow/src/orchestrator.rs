//! Moderation Orchestrator
//!
//! Per item: `Init -> Dispatch -> Pending -> Joined -> Aggregated`, or
//! `Dropped` when the content type needs no analysis. Each branch runs as
//! its own task and only ever writes its own slot.

use futures::stream::{FuturesUnordered, StreamExt};
use modera_classifiers::{AdapterRegistry, AnalysisParams, JobPoller, RetryPolicy};
use modera_core::{
    Branch, BranchState, ClassifierConfig, Config, ContentItem, ContentType, FailureKind, Outcome,
    Verdict,
};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::aggregator::DecisionAggregator;
use crate::sink::{ResultSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Dispatch,
    Pending,
    Joined,
    Aggregated,
    Dropped,
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WorkflowState::Init => write!(f, "init"),
            WorkflowState::Dispatch => write!(f, "dispatch"),
            WorkflowState::Pending => write!(f, "pending"),
            WorkflowState::Joined => write!(f, "joined"),
            WorkflowState::Aggregated => write!(f, "aggregated"),
            WorkflowState::Dropped => write!(f, "dropped"),
        }
    }
}

/// Branches to dispatch for one item, in branch order without duplicates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BranchPlan {
    branches: Vec<Branch>,
}

impl BranchPlan {
    pub fn for_content_type(content_type: ContentType) -> Self {
        Self::default().with_branches(content_type.branches())
    }

    /// Add branches to the plan (multi-modal items request a superset)
    pub fn with_branches(mut self, branches: impl IntoIterator<Item = Branch>) -> Self {
        self.branches.extend(branches);
        self.branches.sort();
        self.branches.dedup();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

/// Outcome of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub content_id: String,
    pub state: WorkflowState,
    /// `None` only when the item was dropped
    pub verdict: Option<Verdict>,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The verdict was computed but could not be stored
    #[error("Failed to persist verdict for {}: {source}", verdict.content_id)]
    Persistence {
        verdict: Box<Verdict>,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub overall_timeout: Duration,
    pub params: BTreeMap<Branch, AnalysisParams>,
}

impl OrchestratorSettings {
    pub fn new(overall_timeout: Duration) -> Self {
        Self {
            overall_timeout,
            params: BTreeMap::new(),
        }
    }

    pub fn with_params(mut self, branch: Branch, params: AnalysisParams) -> Self {
        self.params.insert(branch, params);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let classifiers: &ClassifierConfig = &config.classifiers;
        let retry = RetryPolicy::with_max_attempts(classifiers.backend_max_attempts);
        let params = |min_confidence: f32| {
            AnalysisParams::new(min_confidence)
                .with_language_code(classifiers.text_language_code.clone())
                .with_retry(retry)
        };

        Self::new(Duration::from_secs(config.workflow.timeout_secs))
            .with_params(Branch::Text, params(classifiers.text_min_confidence))
            .with_params(Branch::Image, params(classifiers.image_min_confidence))
            .with_params(Branch::Video, params(classifiers.video_min_confidence))
    }

    fn params_for(&self, branch: Branch) -> AnalysisParams {
        self.params
            .get(&branch)
            .cloned()
            .unwrap_or_else(|| AnalysisParams::new(0.0))
    }
}

#[derive(Debug)]
struct BranchSlot {
    state: BranchState,
    outcome: Option<Outcome>,
}

impl BranchSlot {
    fn pending() -> Self {
        Self {
            state: BranchState::Pending,
            outcome: None,
        }
    }

    /// First terminal write wins
    fn complete(&mut self, outcome: Outcome) {
        if self.state.is_terminal() {
            return;
        }
        self.state = outcome.state();
        self.outcome = Some(outcome);
    }
}

pub struct ModerationOrchestrator {
    registry: AdapterRegistry,
    poller: JobPoller,
    aggregator: DecisionAggregator,
    sink: Arc<dyn ResultSink>,
    settings: OrchestratorSettings,
}

impl ModerationOrchestrator {
    pub fn new(
        registry: AdapterRegistry,
        poller: JobPoller,
        aggregator: DecisionAggregator,
        sink: Arc<dyn ResultSink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            poller,
            aggregator,
            sink,
            settings,
        }
    }

    pub fn branches_for(content_type: ContentType) -> BranchPlan {
        BranchPlan::for_content_type(content_type)
    }

    /// Run the full workflow for one item and persist its verdict.
    pub async fn run(&self, item: ContentItem) -> Result<WorkflowRun, WorkflowError> {
        let plan = Self::branches_for(item.content_type);
        self.run_with_plan(item, plan).await
    }

    #[tracing::instrument(
        skip(self, item, plan),
        fields(content_id = %item.content_id, content_type = %item.content_type)
    )]
    pub async fn run_with_plan(
        &self,
        item: ContentItem,
        plan: BranchPlan,
    ) -> Result<WorkflowRun, WorkflowError> {
        let started = Instant::now();
        let content_id = item.content_id.clone();

        if plan.is_empty() {
            tracing::info!(key = %item.source.key, "No analysis branch for content type, dropping item");
            return Ok(WorkflowRun {
                content_id,
                state: WorkflowState::Dropped,
                verdict: None,
                elapsed: started.elapsed(),
            });
        }

        let outcomes = self.dispatch_and_join(item, &plan).await;
        tracing::debug!(state = %WorkflowState::Joined, branches = outcomes.len(), "Branches joined");

        let verdict = self.aggregator.aggregate(&content_id, &outcomes);

        if let Err(source) = self.sink.put(&verdict.to_record()).await {
            tracing::error!(
                error = %source,
                status = %verdict.status,
                "Failed to persist verdict"
            );
            return Err(WorkflowError::Persistence {
                verdict: Box::new(verdict),
                source,
            });
        }

        let elapsed = started.elapsed();
        tracing::info!(
            status = %verdict.status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Moderation workflow completed"
        );

        Ok(WorkflowRun {
            content_id,
            state: WorkflowState::Aggregated,
            verdict: Some(verdict),
            elapsed,
        })
    }

    /// Spawn one task per branch and wait for all of them or the deadline.
    async fn dispatch_and_join(
        &self,
        item: ContentItem,
        plan: &BranchPlan,
    ) -> BTreeMap<Branch, Outcome> {
        let item = Arc::new(item);
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + self.settings.overall_timeout;

        let mut slots: BTreeMap<Branch, BranchSlot> = BTreeMap::new();
        let mut abort_handles = Vec::new();
        let mut running = FuturesUnordered::new();

        for &branch in plan.branches() {
            let slot = slots.entry(branch).or_insert_with(BranchSlot::pending);

            let Some(adapter) = self.registry.get(branch).await else {
                tracing::error!(branch = %branch, "No classifier adapter registered");
                slot.complete(Outcome::failed(
                    FailureKind::Internal,
                    format!("No classifier adapter registered for {} branch", branch),
                ));
                continue;
            };

            let item = item.clone();
            let params = self.settings.params_for(branch);
            let poller = self.poller.clone();
            let token = cancel.child_token();
            let span = tracing::info_span!("branch", branch = %branch);

            let handle = tokio::spawn(
                async move {
                    let task = adapter.analyze(&item, &params).await;
                    task.resolve(&poller, token).await
                }
                .instrument(span),
            );
            abort_handles.push(handle.abort_handle());
            running.push(async move { (branch, handle.await) });
        }

        tracing::debug!(state = %WorkflowState::Pending, running = running.len(), "Branches dispatched");

        let deadline_sleep = sleep_until(deadline);
        tokio::pin!(deadline_sleep);

        loop {
            tokio::select! {
                next = running.next() => {
                    let Some((branch, joined)) = next else {
                        break;
                    };
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            tracing::error!(branch = %branch, error = %err, "Branch task crashed");
                            Outcome::failed(FailureKind::Internal, format!("Branch task crashed: {}", err))
                        }
                    };
                    tracing::debug!(branch = %branch, state = %outcome.state(), "Branch finished");
                    if let Some(slot) = slots.get_mut(&branch) {
                        slot.complete(outcome);
                    }
                }
                _ = &mut deadline_sleep => {
                    cancel.cancel();
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    for (branch, slot) in slots.iter_mut().filter(|(_, s)| !s.state.is_terminal()) {
                        tracing::warn!(
                            branch = %branch,
                            timeout_secs = self.settings.overall_timeout.as_secs(),
                            "Branch timed out"
                        );
                        slot.complete(Outcome::TimedOut);
                    }
                    break;
                }
            }
        }

        slots
            .into_iter()
            .map(|(branch, slot)| (branch, slot.outcome.unwrap_or(Outcome::TimedOut)))
            .collect()
    }
}
