//! Shared application state handed to every handler.

use modera_core::Config;
use modera_storage::StorageFactory;
use modera_workflow::{VerdictLookup, WorkflowDispatcher};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Bucket-scoped storage handles (uploads, results, ingest sources)
    pub storage: Arc<StorageFactory>,
    pub dispatcher: WorkflowDispatcher,
    /// Read side of the result sink
    pub verdicts: Arc<dyn VerdictLookup>,
}
