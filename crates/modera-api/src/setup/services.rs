//! Wires classifiers, sinks and the workflow dispatcher from configuration.

use crate::state::AppState;
use anyhow::{Context, Result};
use modera_classifiers::{AdapterRegistry, JobPoller, RetryPolicy};
use modera_core::Config;
use modera_db::VerdictRepository;
use modera_storage::StorageFactory;
use modera_workflow::{
    AggregationPolicy, DatabaseSink, DecisionAggregator, DualSink, ModerationOrchestrator,
    ObjectStoreSink, OrchestratorSettings, ResultSink, RetryingSink, VerdictLookup,
    WorkflowDispatcher,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub async fn initialize_services(config: &Config, pool: Option<PgPool>) -> Result<Arc<AppState>> {
    let storage = Arc::new(StorageFactory::new(config.storage.clone()));
    let results = storage
        .results()
        .await
        .context("Failed to open results storage")?;

    let object_sink = Arc::new(ObjectStoreSink::new(results));
    let (sink, verdicts): (Arc<dyn ResultSink>, Arc<dyn VerdictLookup>) = match pool {
        Some(pool) => {
            let records = Arc::new(DatabaseSink::new(VerdictRepository::new(pool)));
            (
                Arc::new(DualSink::new(object_sink, records.clone())),
                records,
            )
        }
        None => (object_sink.clone(), object_sink),
    };
    let sink = Arc::new(RetryingSink::new(
        sink,
        RetryPolicy::with_max_attempts(config.workflow.sink_max_attempts),
    ));

    let registry = build_registry(config, storage.clone()).await;
    let branches = registry.branches().await;
    tracing::info!(branches = ?branches, "Classifier adapters registered");

    let poller = JobPoller::new(
        Duration::from_secs(config.classifiers.video_poll_interval_secs),
        Duration::from_secs(config.classifiers.video_job_timeout_secs),
    );
    let aggregator = DecisionAggregator::new(AggregationPolicy::from(&config.aggregation));
    let orchestrator = ModerationOrchestrator::new(
        registry,
        poller,
        aggregator,
        sink,
        OrchestratorSettings::from_config(config),
    );
    let dispatcher = WorkflowDispatcher::new(Arc::new(orchestrator), config.workflow.max_concurrent);

    Ok(Arc::new(AppState {
        config: config.clone(),
        storage,
        dispatcher,
        verdicts,
    }))
}

#[cfg(feature = "aws")]
async fn build_registry(config: &Config, storage: Arc<StorageFactory>) -> AdapterRegistry {
    use modera_classifiers::aws::{
        load_sdk_config, ComprehendTextBackend, RekognitionImageBackend, RekognitionVideoBackend,
    };
    use modera_classifiers::{ImageAdapter, TextAdapter, VideoAdapter};

    let sdk = load_sdk_config(config.storage.aws_region.as_deref()).await;
    let registry = AdapterRegistry::new();

    registry
        .register(Arc::new(TextAdapter::new(
            Arc::new(ComprehendTextBackend::new(&sdk)),
            storage,
        )))
        .await;
    registry
        .register(Arc::new(ImageAdapter::new(Arc::new(
            RekognitionImageBackend::new(&sdk),
        ))))
        .await;
    registry
        .register(Arc::new(VideoAdapter::new(Arc::new(
            RekognitionVideoBackend::new(&sdk),
        ))))
        .await;

    registry
}

#[cfg(not(feature = "aws"))]
async fn build_registry(_config: &Config, _storage: Arc<StorageFactory>) -> AdapterRegistry {
    tracing::warn!("Built without the aws feature, every branch will fail with an internal error");
    AdapterRegistry::new()
}
