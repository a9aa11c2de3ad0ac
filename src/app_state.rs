use crate::config::Settings;
use crate::prelude::*;
use crate::records::build_record_tree;
use crate::retention::RetentionJob;
use crate::storage::build_blob_store;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

pub struct AppState {
    pub job: Arc<RetentionJob>,
    pub start_time: SystemTime,
}

impl AppState {
    pub fn new(job: Arc<RetentionJob>) -> Arc<Self> {
        Arc::new(AppState {
            job,
            start_time: SystemTime::now(),
        })
    }

    /// Builds both stores and the job from loaded settings.
    pub async fn from_settings(settings: &Settings) -> Result<Arc<Self>> {
        let blob_store = build_blob_store(&settings.storage).await?;
        let record_tree = build_record_tree(&settings.records)?;
        info!(
            blob_store = %blob_store.describe(),
            record_tree = %record_tree.describe(),
            "retention job wired"
        );

        let job = RetentionJob::new(blob_store, record_tree, settings.job.clone())?;
        Ok(Self::new(Arc::new(job)))
    }
}
