//! Modera Workflow
//!
//! The moderation orchestrator fans one content item out to its classifier
//! branches, joins them under a deadline, and hands the outcomes to the
//! decision aggregator. The resulting verdict is written through a result sink.

pub mod aggregator;
pub mod dispatcher;
pub mod orchestrator;
pub mod sink;

pub use aggregator::{AggregationPolicy, Clock, DecisionAggregator, SystemClock};
pub use dispatcher::WorkflowDispatcher;
pub use orchestrator::{
    BranchPlan, ModerationOrchestrator, OrchestratorSettings, WorkflowError, WorkflowRun,
    WorkflowState,
};
pub use sink::{
    DatabaseSink, DualSink, InMemorySink, ObjectStoreSink, ResultSink, RetryingSink, SinkError,
    VerdictLookup,
};
