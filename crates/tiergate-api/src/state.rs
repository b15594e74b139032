//! Application state shared across API handlers

use std::sync::Arc;

use evm_node_client::NodeClient;
use tiergate_core::DriverError;
use tiergate_engine::{BatchSummary, TierDriver};
use tokio::sync::Mutex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    driver: Arc<TierDriver>,
    node_client: Option<NodeClient>,
    /// Held while a batch runs
    batch: Mutex<()>,
}

impl AppState {
    /// Create state around a driver. `node_client` backs the status endpoint.
    pub fn new(driver: Arc<TierDriver>, node_client: Option<NodeClient>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                driver,
                node_client,
                batch: Mutex::new(()),
            }),
        }
    }

    pub fn driver(&self) -> &Arc<TierDriver> {
        &self.inner.driver
    }

    pub fn node_client(&self) -> Option<&NodeClient> {
        self.inner.node_client.as_ref()
    }

    /// Run a batch unless one is already running, in which case `None` is returned
    pub async fn try_run_batch(&self) -> Option<Result<BatchSummary, DriverError>> {
        let _running = self.inner.batch.try_lock().ok()?;
        Some(self.inner.driver.run_batch().await)
    }
}
