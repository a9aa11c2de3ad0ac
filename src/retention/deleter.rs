use super::outcome::DeletionOutcome;
use crate::error::BatchError;
use crate::storage::BlobStore;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CONCURRENT_DELETES: usize = 16;

/// Deletes a set of objects with bounded concurrency. A failing item is
/// recorded and never stops its siblings.
#[derive(Debug, Clone, Copy)]
pub struct BatchDeleter {
    max_concurrent: usize,
}

impl Default for BatchDeleter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_DELETES)
    }
}

impl BatchDeleter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Deletes every name in `names`. Fails only when the store cannot be
    /// reached before the first deletion is issued; failures are reported in
    /// input order.
    pub async fn delete_all(&self, store: &dyn BlobStore, names: Vec<String>) -> Result<DeletionOutcome, BatchError> {
        if names.is_empty() {
            return Ok(DeletionOutcome::default());
        }

        store.check().await.map_err(|source| BatchError::Unreachable {
            store: store.describe(),
            source,
        })?;

        let mut results: Vec<_> = stream::iter(names.into_iter().enumerate())
            .map(|(index, name)| async move {
                let result = store.delete_object(&name).await;
                (index, name, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut outcome = DeletionOutcome::default();
        for (_, name, result) in results {
            match result {
                Ok(()) => {
                    debug!(object = %name, "deleted");
                    outcome.record_success();
                }
                Err(source) => {
                    warn!(object = %name, error = %source, "failed to delete object");
                    outcome.record_failure(name, source);
                }
            }
        }

        info!(
            store = %store.describe(),
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            failed = outcome.failed.len(),
            "batch delete finished"
        );
        Ok(outcome)
    }
}
