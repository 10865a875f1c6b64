//! Adapter registry keyed by branch

use modera_core::Branch;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapter::ClassifierAdapter;

/// Registry for looking up the adapter that serves a branch.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<Branch, Arc<dyn ClassifierAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the branch it reports, replacing any previous one
    pub async fn register(&self, adapter: Arc<dyn ClassifierAdapter>) {
        let branch = adapter.branch();
        let mut adapters = self.adapters.write().await;
        if adapters.insert(branch, adapter).is_some() {
            tracing::warn!(branch = %branch, "Replaced existing classifier adapter");
        }
    }

    pub async fn get(&self, branch: Branch) -> Option<Arc<dyn ClassifierAdapter>> {
        self.adapters.read().await.get(&branch).cloned()
    }

    /// Registered branches in branch order
    pub async fn branches(&self) -> Vec<Branch> {
        let mut branches: Vec<_> = self.adapters.read().await.keys().copied().collect();
        branches.sort();
        branches
    }
}
