//! End-to-end workflow tests with scripted adapters

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use modera_classifiers::{
    AdapterRegistry, AnalysisParams, BackendError, BranchTask, ClassifierAdapter, JobPoller,
    JobStatus, JobStatusSource, PollableJob,
};
use modera_core::{
    AppError, Branch, BranchState, ContentItem, ContentType, ErrorMetadata, FailureKind, Finding,
    FindingCategory, Outcome, SourceLocation, VerdictRecord, VerdictStatus,
};
use modera_workflow::{
    AggregationPolicy, BranchPlan, Clock, DecisionAggregator, InMemorySink,
    ModerationOrchestrator, OrchestratorSettings, ResultSink, SinkError, VerdictLookup,
    WorkflowDispatcher, WorkflowError, WorkflowState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }
}

/// Adapter that answers with a fixed outcome after a delay
struct ScriptedAdapter {
    branch: Branch,
    delay: Duration,
    outcome: Outcome,
}

#[async_trait]
impl ClassifierAdapter for ScriptedAdapter {
    fn branch(&self) -> Branch {
        self.branch
    }

    async fn analyze(&self, _item: &ContentItem, _params: &AnalysisParams) -> BranchTask {
        tokio::time::sleep(self.delay).await;
        BranchTask::Immediate(self.outcome.clone())
    }
}

struct NeverFinishes;

#[async_trait]
impl JobStatusSource for NeverFinishes {
    async fn status(&self, _job_id: &str) -> Result<JobStatus, BackendError> {
        Ok(JobStatus::InProgress)
    }
}

/// Adapter whose job never completes
struct StuckVideoAdapter;

#[async_trait]
impl ClassifierAdapter for StuckVideoAdapter {
    fn branch(&self) -> Branch {
        Branch::Video
    }

    async fn analyze(&self, _item: &ContentItem, _params: &AnalysisParams) -> BranchTask {
        BranchTask::Pollable(PollableJob {
            branch: Branch::Video,
            job_id: "job-stuck".to_string(),
            source: Arc::new(NeverFinishes),
        })
    }
}

struct PanickingAdapter;

#[async_trait]
impl ClassifierAdapter for PanickingAdapter {
    fn branch(&self) -> Branch {
        Branch::Image
    }

    async fn analyze(&self, _item: &ContentItem, _params: &AnalysisParams) -> BranchTask {
        panic!("classifier exploded");
    }
}

struct BrokenSink;

#[async_trait]
impl ResultSink for BrokenSink {
    async fn put(&self, _record: &VerdictRecord) -> Result<(), SinkError> {
        Err(SinkError::Database("connection refused".to_string()))
    }
}

fn item(content_type: ContentType, key: &str) -> ContentItem {
    ContentItem::new("c-1", content_type, SourceLocation::new("uploads", key))
}

fn text_finding(category: FindingCategory, label: &str, confidence: f32) -> Finding {
    Finding::new(Branch::Text, category, label, confidence)
}

fn scripted(branch: Branch, delay_secs: u64, outcome: Outcome) -> Arc<dyn ClassifierAdapter> {
    Arc::new(ScriptedAdapter {
        branch,
        delay: Duration::from_secs(delay_secs),
        outcome,
    })
}

async fn orchestrator_with(
    adapters: Vec<Arc<dyn ClassifierAdapter>>,
    sink: Arc<dyn ResultSink>,
    overall_timeout: Duration,
) -> ModerationOrchestrator {
    let registry = AdapterRegistry::new();
    for adapter in adapters {
        registry.register(adapter).await;
    }
    ModerationOrchestrator::new(
        registry,
        JobPoller::new(Duration::from_secs(5), Duration::from_secs(3600)),
        DecisionAggregator::with_clock(AggregationPolicy::default(), Arc::new(FixedClock)),
        sink,
        OrchestratorSettings::new(overall_timeout),
    )
}

async fn run_text(outcome: Outcome) -> (VerdictStatus, Arc<InMemorySink>) {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(
        vec![scripted(Branch::Text, 0, outcome)],
        sink.clone(),
        Duration::from_secs(60),
    )
    .await;
    let run = orchestrator
        .run(item(ContentType::Text, "c-1/notes.txt"))
        .await
        .unwrap();
    (run.verdict.unwrap().status, sink)
}

#[tokio::test]
async fn unknown_content_type_is_dropped_without_verdict() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(vec![], sink.clone(), Duration::from_secs(60)).await;

    let run = orchestrator
        .run(item(ContentType::Unknown, "c-1/archive.zip"))
        .await
        .unwrap();

    assert_eq!(run.state, WorkflowState::Dropped);
    assert!(run.verdict.is_none());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn clean_text_passes_and_is_persisted() {
    let (status, sink) = run_text(Outcome::success(vec![])).await;
    assert_eq!(status, VerdictStatus::Pass);

    let stored = sink.get("c-1").await.unwrap().unwrap();
    assert_eq!(stored.final_status, VerdictStatus::Pass);
    assert_eq!(stored.branch_states.get(&Branch::Text), Some(&BranchState::Success));
}

#[tokio::test]
async fn pii_finding_fails() {
    let (status, _) = run_text(Outcome::success(vec![text_finding(
        FindingCategory::Pii,
        "SSN",
        0.6,
    )]))
    .await;
    assert_eq!(status, VerdictStatus::Fail);
}

#[tokio::test]
async fn severe_hate_speech_fails_with_severity_flag() {
    let (status, sink) = run_text(Outcome::success(vec![text_finding(
        FindingCategory::Toxicity,
        "HATE_SPEECH",
        0.85,
    )]))
    .await;

    assert_eq!(status, VerdictStatus::Fail);
    let stored = sink.get("c-1").await.unwrap().unwrap();
    assert_eq!(stored.severity_flags, vec!["HATE_SPEECH".to_string()]);
    assert_eq!(stored.text_labels, vec!["HATE_SPEECH".to_string()]);
}

#[tokio::test]
async fn moderate_toxicity_goes_to_review() {
    let (status, sink) = run_text(Outcome::success(vec![text_finding(
        FindingCategory::Toxicity,
        "INSULT",
        0.72,
    )]))
    .await;

    assert_eq!(status, VerdictStatus::Review);
    let stored = sink.get("c-1").await.unwrap().unwrap();
    assert_eq!(stored.toxicity_flags, vec!["INSULT".to_string()]);
}

#[tokio::test]
async fn all_branches_empty_pass() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(
        vec![
            scripted(Branch::Text, 0, Outcome::success(vec![])),
            scripted(Branch::Image, 0, Outcome::success(vec![])),
            scripted(Branch::Video, 0, Outcome::success(vec![])),
        ],
        sink,
        Duration::from_secs(60),
    )
    .await;

    let plan = BranchPlan::default().with_branches(Branch::ALL);
    let run = orchestrator
        .run_with_plan(item(ContentType::Video, "c-1/clip.mp4"), plan)
        .await
        .unwrap();

    assert_eq!(run.state, WorkflowState::Aggregated);
    assert_eq!(run.verdict.unwrap().status, VerdictStatus::Pass);
}

#[tokio::test(start_paused = true)]
async fn verdict_is_independent_of_completion_order() {
    let outcomes = [
        (
            Branch::Text,
            Outcome::success(vec![text_finding(FindingCategory::Toxicity, "INSULT", 0.75)]),
        ),
        (Branch::Image, Outcome::success(vec![])),
        (Branch::Video, Outcome::backend_error("throttled")),
    ];
    let orders: [[u64; 3]; 3] = [[1, 2, 3], [3, 2, 1], [2, 3, 1]];

    let mut verdicts = Vec::new();
    for delays in orders {
        let adapters = outcomes
            .iter()
            .zip(delays)
            .map(|((branch, outcome), delay)| scripted(*branch, delay, outcome.clone()))
            .collect();
        let orchestrator = orchestrator_with(
            adapters,
            Arc::new(InMemorySink::new()),
            Duration::from_secs(60),
        )
        .await;
        let run = orchestrator
            .run_with_plan(
                item(ContentType::Text, "c-1/notes.txt"),
                BranchPlan::default().with_branches(Branch::ALL),
            )
            .await
            .unwrap();
        verdicts.push(run.verdict.unwrap());
    }

    assert_eq!(verdicts[0].status, VerdictStatus::Review);
    assert_eq!(verdicts[0], verdicts[1]);
    assert_eq!(verdicts[1], verdicts[2]);
}

#[tokio::test(start_paused = true)]
async fn stuck_branch_times_out_at_workflow_deadline() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(
        vec![
            scripted(Branch::Text, 1, Outcome::success(vec![])),
            Arc::new(StuckVideoAdapter),
        ],
        sink.clone(),
        Duration::from_secs(30),
    )
    .await;

    let start = Instant::now();
    let run = orchestrator
        .run_with_plan(
            item(ContentType::Video, "c-1/clip.mp4"),
            BranchPlan::default().with_branches([Branch::Text, Branch::Video]),
        )
        .await
        .unwrap();

    assert!(start.elapsed() <= Duration::from_secs(31));
    assert_eq!(run.state, WorkflowState::Aggregated);
    let verdict = run.verdict.unwrap();
    assert_eq!(verdict.status, VerdictStatus::Error);
    assert_eq!(verdict.branch_states[&Branch::Video], BranchState::TimedOut);
    assert_eq!(verdict.branch_states[&Branch::Text], BranchState::Success);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn missing_adapter_is_an_internal_failure() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(vec![], sink, Duration::from_secs(60)).await;

    let run = orchestrator
        .run(item(ContentType::Image, "c-1/cat.png"))
        .await
        .unwrap();

    let verdict = run.verdict.unwrap();
    assert_eq!(verdict.status, VerdictStatus::Error);
    assert_eq!(verdict.branch_states[&Branch::Image], BranchState::Failed);
}

#[tokio::test]
async fn crashing_branch_does_not_take_down_siblings() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(
        vec![
            scripted(
                Branch::Text,
                0,
                Outcome::success(vec![text_finding(FindingCategory::Pii, "EMAIL", 0.9)]),
            ),
            Arc::new(PanickingAdapter),
        ],
        sink,
        Duration::from_secs(60),
    )
    .await;

    let run = orchestrator
        .run_with_plan(
            item(ContentType::Image, "c-1/cat.png"),
            BranchPlan::default().with_branches([Branch::Text, Branch::Image]),
        )
        .await
        .unwrap();

    let verdict = run.verdict.unwrap();
    assert_eq!(verdict.branch_states[&Branch::Image], BranchState::Failed);
    assert_eq!(verdict.status, VerdictStatus::Fail);
}

#[tokio::test]
async fn redelivery_overwrites_the_stored_verdict() {
    let sink = Arc::new(InMemorySink::new());
    let orchestrator = orchestrator_with(
        vec![scripted(Branch::Text, 0, Outcome::success(vec![]))],
        sink.clone(),
        Duration::from_secs(60),
    )
    .await;

    orchestrator.run(item(ContentType::Text, "c-1/a.txt")).await.unwrap();
    orchestrator.run(item(ContentType::Text, "c-1/a.txt")).await.unwrap();

    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn persistence_failure_still_carries_the_verdict() {
    let orchestrator = orchestrator_with(
        vec![scripted(Branch::Text, 0, Outcome::success(vec![]))],
        Arc::new(BrokenSink),
        Duration::from_secs(60),
    )
    .await;

    let err = orchestrator
        .run(item(ContentType::Text, "c-1/a.txt"))
        .await
        .unwrap_err();

    match err {
        WorkflowError::Persistence { verdict, source } => {
            assert_eq!(verdict.status, VerdictStatus::Pass);
            assert!(matches!(source, SinkError::Database(_)));
        }
    }
}

async fn broken_sink_dispatcher() -> WorkflowDispatcher {
    let orchestrator = orchestrator_with(
        vec![scripted(
            Branch::Text,
            0,
            Outcome::success(vec![text_finding(FindingCategory::Toxicity, "HATE_SPEECH", 0.9)]),
        )],
        Arc::new(BrokenSink),
        Duration::from_secs(60),
    )
    .await;
    WorkflowDispatcher::new(Arc::new(orchestrator), 2)
}

#[tokio::test]
async fn run_now_returns_the_unpersisted_verdict() {
    let dispatcher = broken_sink_dispatcher().await;

    let err = dispatcher
        .run_now(item(ContentType::Text, "c-1/a.txt"))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "PERSISTENCE_ERROR");
    let record = err.unpersisted_verdict().unwrap();
    assert_eq!(record.content_id, "c-1");
    assert_eq!(record.final_status, VerdictStatus::Fail);
    assert_eq!(record.text_labels, vec!["HATE_SPEECH".to_string()]);
    assert_eq!(record.severity_flags, vec!["HATE_SPEECH".to_string()]);
    assert_eq!(dispatcher.available_permits(), 2);
}

#[tokio::test]
async fn spawned_run_keeps_the_unpersisted_verdict() {
    let dispatcher = broken_sink_dispatcher().await;

    let result = dispatcher
        .spawn(item(ContentType::Text, "c-1/a.txt"))
        .await
        .unwrap();

    match result {
        Err(AppError::Persistence { verdict, .. }) => {
            assert_eq!(verdict.final_status, VerdictStatus::Fail);
            assert_eq!(verdict.branch_states[&Branch::Text], BranchState::Success);
        }
        other => panic!("expected a persistence error, got {:?}", other),
    }
}

#[tokio::test]
async fn input_failures_surface_as_error_verdicts() {
    let (status, sink) = run_text(Outcome::failed(FailureKind::Input, "No text to moderate")).await;
    assert_eq!(status, VerdictStatus::Error);
    let stored = sink.get("c-1").await.unwrap().unwrap();
    assert_eq!(stored.branch_states[&Branch::Text], BranchState::Failed);
}
