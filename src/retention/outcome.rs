use super::filter::MetadataAnomaly;
use super::job::PurgeMode;
use crate::error::{ItemDeleteError, StoreError};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Tally of one deletion pass.
///
/// `succeeded + failed.len() == attempted` holds after every mutation.
#[derive(Debug, Default, Serialize)]
pub struct DeletionOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<ItemDeleteError>,
}

impl DeletionOutcome {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, name: impl Into<String>, source: StoreError) {
        self.attempted += 1;
        self.failed.push(ItemDeleteError {
            name: name.into(),
            source,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|failure| failure.name.as_str()).collect()
    }

    /// Appends `other` after `self`, keeping failure order.
    pub fn merge(mut self, other: DeletionOutcome) -> DeletionOutcome {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed);
        self
    }
}

impl Serialize for ItemDeleteError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ItemDeleteError", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("error", &self.source.to_string())?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Listing,
    Filtering,
    DeletingStorage,
    DeletingRecords,
    Completed,
    Failed,
}

/// Result of a run that reached `Completed`, possibly with per-item failures.
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub mode: PurgeMode,
    /// Shared by both passes. Absent when nothing is age filtered.
    pub cutoff: Option<DateTime<Utc>>,
    pub state: JobState,
    pub storage: DeletionOutcome,
    pub records: DeletionOutcome,
    pub kept_objects: usize,
    pub kept_records: usize,
    pub anomalies: Vec<MetadataAnomaly>,
}

impl JobReport {
    pub fn is_clean(&self) -> bool {
        self.storage.is_clean() && self.records.is_clean()
    }

    /// Both passes folded into one tally, storage first.
    pub fn outcome(self) -> DeletionOutcome {
        self.storage.merge(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_stays_consistent() {
        let mut outcome = DeletionOutcome::default();
        outcome.record_success();
        outcome.record_failure("b", StoreError::NotFound("b".into()));
        outcome.record_success();

        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.succeeded + outcome.failed.len(), outcome.attempted);
        assert_eq!(outcome.failed_names(), vec!["b"]);
        assert!(!outcome.is_clean());
    }

    #[test]
    fn merge_keeps_failure_order() {
        let mut storage = DeletionOutcome::default();
        storage.record_failure("img/1.jpg", StoreError::S3Delete("denied".into()));
        let mut records = DeletionOutcome::default();
        records.record_success();
        records.record_failure("-Nx1", StoreError::BatchRejected("401".into()));

        let merged = storage.merge(records);

        assert_eq!(merged.attempted, 3);
        assert_eq!(merged.succeeded, 1);
        assert_eq!(merged.failed_names(), vec!["img/1.jpg", "-Nx1"]);
    }

    #[test]
    fn failures_serialize_with_message() {
        let mut outcome = DeletionOutcome::default();
        outcome.record_failure("a", StoreError::NotFound("a".into()));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["failed"][0]["name"], "a");
        assert_eq!(json["failed"][0]["error"], "Not found: a");
    }
}
