//! Application state.

use std::sync::Arc;

use cardwise_lock::LockCoordinator;
use cardwise_store::RocksStore;

use crate::config::ServiceConfig;
use crate::eligibility::EligibilityFilter;
use crate::pipeline::ExpensePipeline;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Lock coordinator over the store's lease key space.
    pub locks: LockCoordinator,

    /// The expense accrual pipeline.
    pub pipeline: ExpensePipeline,

    /// Read-side eligibility filter.
    pub eligibility: EligibilityFilter,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The lock coordinator runs over the same database as the ledgers, so
    /// every instance opening this data directory contends on one key space.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let locks = LockCoordinator::new(Arc::new(store.lease_lock()));
        let pipeline = ExpensePipeline::new(Arc::clone(&store), locks.clone());
        let eligibility = EligibilityFilter::new(Arc::clone(&store));

        Self {
            store,
            locks,
            pipeline,
            eligibility,
            config,
        }
    }
}
