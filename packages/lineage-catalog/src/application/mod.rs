//! Application layer
//!
//! Catalog services that turn submitted metadata into versioned rows. Each
//! mutation resolves its version id up front and then issues one atomic store
//! call; lost identity races are retried here.

pub mod catalog;
pub mod dataset_catalog;
pub mod job_catalog;
pub mod run_lifecycle;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::MetadataCatalog;
pub use dataset_catalog::DatasetCatalog;
pub use job_catalog::JobCatalog;
pub use run_lifecycle::RunLifecycle;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{MetadataStore, NamespaceExistence, NamespaceName, RunExistence};
use crate::error::{CatalogError, Result};

/// Default page size for list operations
pub const DEFAULT_LIMIT: usize = 100;

/// Existence checks answered directly by the store
#[derive(Clone)]
pub struct StoreExistence {
    store: Arc<dyn MetadataStore>,
}

impl StoreExistence {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NamespaceExistence for StoreExistence {
    async fn exists(&self, namespace: &NamespaceName) -> Result<bool> {
        Ok(self.store.find_namespace(namespace).await?.is_some())
    }
}

#[async_trait]
impl RunExistence for StoreExistence {
    async fn run_exists(&self, run_id: Uuid) -> Result<bool> {
        self.store.run_exists(run_id).await
    }
}

/// Re-run `attempt` while it loses a create race or a refresh finds the
/// version pointer moved, at most `max_retries` times.
///
/// Each attempt re-reads the anchor, so the retry naturally becomes an update
/// of the row the winner inserted or committed.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    operation: &'static str,
    max_retries: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err @ CatalogError::IdentityConflict { .. }) if retries < max_retries => {
                retries += 1;
                warn!(operation, retries, "Lost create race, retrying: {}", err);
            }
            Err(err @ CatalogError::StaleVersion { .. }) if retries < max_retries => {
                retries += 1;
                warn!(operation, retries, "Version moved under refresh, retrying: {}", err);
            }
            result => return result,
        }
    }
}
