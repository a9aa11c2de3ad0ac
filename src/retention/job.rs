use super::cutoff::{compute_cutoff, RetentionPolicy};
use super::deleter::{BatchDeleter, DEFAULT_MAX_CONCURRENT_DELETES};
use super::filter::{partition, MetadataAnomaly};
use super::outcome::{DeletionOutcome, JobReport, JobState};
use crate::error::{BatchError, ConfigError, StoreError};
use crate::prelude::*;
use crate::records::{RecordEntry, RecordTree};
use crate::storage::{BlobStore, ObjectLister};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which part of a store a run may touch.
///
/// There is no default: the whole store has to be spelled out as `Entire`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Within(String),
    Entire,
}

impl Scope {
    /// The prefix or tree path, `None` meaning the whole store.
    pub fn path(&self) -> Option<&str> {
        match self {
            Scope::Within(path) => Some(path),
            Scope::Entire => None,
        }
    }

    fn validate(&self, field: &str) -> std::result::Result<(), ConfigError> {
        match self {
            Scope::Within(path) if path.trim_matches(|c: char| c == '/' || c.is_whitespace()).is_empty() => {
                Err(ConfigError::InvalidValue(format!(
                    "{field} is empty; use \"entire\" to target the whole store"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Within(path) => write!(f, "{path}"),
            Scope::Entire => write!(f, "<entire store>"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// Delete only what is older than the policy cutoff.
    #[default]
    AgeFiltered,
    /// Delete everything in scope, with no age filter.
    PurgeEverything,
}

fn default_max_concurrent_deletes() -> usize {
    DEFAULT_MAX_CONCURRENT_DELETES
}

fn default_record_batch_size() -> usize {
    500
}

fn default_created_at_field() -> String {
    "timeCreated".to_string()
}

/// Immutable per-run configuration of the retention job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetentionConfig {
    pub bucket_scope: Scope,
    pub tree_path: Scope,
    pub policy: RetentionPolicy,
    #[serde(default)]
    pub mode: PurgeMode,
    /// Required alongside `purge_everything` on an `entire` scope.
    #[serde(default)]
    pub confirm_global_purge: bool,
    #[serde(default = "default_max_concurrent_deletes")]
    pub max_concurrent_deletes: usize,
    #[serde(default = "default_record_batch_size")]
    pub record_batch_size: usize,
    #[serde(default = "default_created_at_field")]
    pub created_at_field: String,
}

impl RetentionConfig {
    pub fn new(bucket_scope: Scope, tree_path: Scope, policy: RetentionPolicy) -> Self {
        Self {
            bucket_scope,
            tree_path,
            policy,
            mode: PurgeMode::default(),
            confirm_global_purge: false,
            max_concurrent_deletes: default_max_concurrent_deletes(),
            record_batch_size: default_record_batch_size(),
            created_at_field: default_created_at_field(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.bucket_scope.validate("bucket_scope")?;
        self.tree_path.validate("tree_path")?;
        self.policy.validate()?;

        if self.max_concurrent_deletes == 0 {
            return Err(ConfigError::InvalidValue("max_concurrent_deletes must be greater than zero".into()));
        }
        if self.record_batch_size == 0 {
            return Err(ConfigError::InvalidValue("record_batch_size must be greater than zero".into()));
        }
        if self.created_at_field.is_empty() {
            return Err(ConfigError::InvalidValue("created_at_field is empty".into()));
        }

        let global = self.bucket_scope == Scope::Entire || self.tree_path == Scope::Entire;
        if self.mode == PurgeMode::PurgeEverything && global && !self.confirm_global_purge {
            return Err(ConfigError::UnsafeScope(
                "purge_everything on an entire store requires confirm_global_purge = true".into(),
            ));
        }
        Ok(())
    }
}

/// Tracks the run through its states and logs each transition.
struct Progress {
    state: JobState,
}

impl Progress {
    fn new() -> Self {
        Self { state: JobState::Idle }
    }

    fn advance(&mut self, next: JobState) {
        debug!(from = ?self.state, to = ?next, "retention job transition");
        self.state = next;
    }
}

/// Removes expired objects from a blob store and their records from a record
/// tree. One call to [`RetentionJob::run`] is one pass over both stores.
pub struct RetentionJob {
    blob_store: Arc<dyn BlobStore>,
    record_tree: Arc<dyn RecordTree>,
    config: RetentionConfig,
    deleter: BatchDeleter,
}

impl fmt::Debug for RetentionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionJob")
            .field("config", &self.config)
            .field("deleter", &self.deleter)
            .finish_non_exhaustive()
    }
}

impl RetentionJob {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        record_tree: Arc<dyn RecordTree>,
        config: RetentionConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let deleter = BatchDeleter::new(config.max_concurrent_deletes);
        Ok(Self {
            blob_store,
            record_tree,
            config,
            deleter,
        })
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<JobReport> {
        self.run_at(Utc::now()).await
    }

    /// Runs one pass as if the current time were `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobReport> {
        let mut progress = Progress::new();
        info!(
            mode = ?self.config.mode,
            bucket_scope = %self.config.bucket_scope,
            tree_path = %self.config.tree_path,
            "retention job starting"
        );

        match self.execute(now, &mut progress).await {
            Ok(report) => {
                info!(
                    cutoff = ?report.cutoff,
                    objects_deleted = report.storage.succeeded,
                    objects_failed = report.storage.failed.len(),
                    records_deleted = report.records.succeeded,
                    records_failed = report.records.failed.len(),
                    "retention job completed"
                );
                Ok(report)
            }
            Err(err) => {
                error!(during = ?progress.state, error = %err, "retention job aborted");
                progress.advance(JobState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&self, now: DateTime<Utc>, progress: &mut Progress) -> Result<JobReport> {
        let cutoff = match self.config.mode {
            PurgeMode::AgeFiltered => Some(compute_cutoff(&self.config.policy, now)?),
            PurgeMode::PurgeEverything => None,
        };

        progress.advance(JobState::Listing);
        let objects = ObjectLister::new(self.blob_store.as_ref(), &self.config.bucket_scope)
            .list()
            .await?;

        progress.advance(JobState::Filtering);
        let mut anomalies = Vec::new();
        let (doomed, kept_objects) = match cutoff {
            Some(cutoff) => {
                let split = partition(objects, cutoff);
                report_anomalies("object", &split.anomalies);
                anomalies.extend(split.anomalies.iter().cloned());
                (split.delete_names(), split.keep.len())
            }
            None => (objects.into_iter().map(|object| object.name).collect(), 0),
        };
        info!(to_delete = doomed.len(), kept = kept_objects, "objects classified");

        progress.advance(JobState::DeletingStorage);
        let storage = self.delete_objects(doomed).await;

        progress.advance(JobState::DeletingRecords);
        let (records, kept_records) = match cutoff {
            Some(cutoff) => self.purge_expired_records(cutoff, &mut anomalies).await?,
            None => (self.purge_record_tree().await, 0),
        };

        progress.advance(JobState::Completed);
        Ok(JobReport {
            mode: self.config.mode,
            cutoff,
            state: progress.state,
            storage,
            records,
            kept_objects,
            kept_records,
            anomalies,
        })
    }

    async fn delete_objects(&self, names: Vec<String>) -> DeletionOutcome {
        match self.deleter.delete_all(self.blob_store.as_ref(), names.clone()).await {
            Ok(outcome) => outcome,
            Err(BatchError::Unreachable { store, source }) => {
                error!(%store, error = %source, "blob store unreachable, skipping storage deletions");
                let reason = source.to_string();
                let mut outcome = DeletionOutcome::default();
                for name in names {
                    outcome.record_failure(name, StoreError::ConnectionError(reason.clone()));
                }
                outcome
            }
        }
    }

    /// Deletes records under the tree path whose own creation timestamp is
    /// older than `cutoff`, the same cutoff used for storage.
    async fn purge_expired_records(
        &self,
        cutoff: DateTime<Utc>,
        anomalies: &mut Vec<MetadataAnomaly>,
    ) -> Result<(DeletionOutcome, usize)> {
        let path = self.tree_path();
        let children = self.record_tree.read_children(path).await?;
        let entries: Vec<RecordEntry> = children
            .iter()
            .map(|(key, value)| RecordEntry::from_value(key.clone(), value, &self.config.created_at_field))
            .collect();

        let split = partition(entries, cutoff);
        report_anomalies("record", &split.anomalies);
        anomalies.extend(split.anomalies.iter().cloned());
        info!(to_delete = split.delete.len(), kept = split.keep.len(), "records classified");

        let mut outcome = DeletionOutcome::default();
        for chunk in split.delete_names().chunks(self.config.record_batch_size) {
            match self.record_tree.batch_delete(path, chunk).await {
                Ok(()) => (0..chunk.len()).for_each(|_| outcome.record_success()),
                Err(err) => {
                    warn!(path, keys = chunk.len(), error = %err, "batched record delete rejected");
                    let reason = err.to_string();
                    for key in chunk {
                        outcome.record_failure(key.clone(), StoreError::BatchRejected(reason.clone()));
                    }
                }
            }
        }
        Ok((outcome, split.keep.len()))
    }

    async fn purge_record_tree(&self) -> DeletionOutcome {
        let path = self.tree_path();
        let mut outcome = DeletionOutcome::default();
        match self.record_tree.delete_subtree(path).await {
            Ok(()) => outcome.record_success(),
            Err(err) => {
                warn!(path, error = %err, "failed to delete record subtree");
                outcome.record_failure(self.config.tree_path.to_string(), err);
            }
        }
        outcome
    }

    fn tree_path(&self) -> &str {
        self.config.tree_path.path().unwrap_or("")
    }
}

fn report_anomalies(kind: &str, anomalies: &[MetadataAnomaly]) {
    for anomaly in anomalies {
        warn!(
            kind,
            name = %anomaly.name,
            created_at = ?anomaly.created_at,
            "no usable creation time, keeping"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn config() -> RetentionConfig {
        RetentionConfig::new(
            Scope::Within("spiders/".into()),
            Scope::Within("spiders".into()),
            RetentionPolicy::AnchoredDay {
                hour: 6,
                timezone: New_York,
            },
        )
    }

    #[test]
    fn default_config_is_age_filtered() {
        let config = config();
        assert_eq!(config.mode, PurgeMode::AgeFiltered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_scope_must_be_spelled_entire() {
        let mut config = config();
        config.bucket_scope = Scope::Within(" / ".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn global_purge_requires_confirmation() {
        let mut config = config();
        config.mode = PurgeMode::PurgeEverything;
        config.tree_path = Scope::Entire;
        assert!(matches!(config.validate(), Err(ConfigError::UnsafeScope(_))));

        config.confirm_global_purge = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scoped_purge_does_not_need_confirmation() {
        let mut config = config();
        config.mode = PurgeMode::PurgeEverything;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = config();
        config.max_concurrent_deletes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn scope_deserializes_from_string_or_table() {
        let entire: Scope = serde_json::from_str(r#""entire""#).unwrap();
        let within: Scope = serde_json::from_str(r#"{"within":"spiders/"}"#).unwrap();
        assert_eq!(entire, Scope::Entire);
        assert_eq!(within.path(), Some("spiders/"));
    }
}
