use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::America::New_York;
use retention_purge::error::{ConfigError, Error, StoreError};
use retention_purge::records::MemoryTree;
use retention_purge::retention::{
    CreationTime, JobState, PurgeMode, RetentionConfig, RetentionJob, RetentionPolicy, Scope,
};
use retention_purge::storage::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;

/// 2024-03-11 12:00 in New York; the anchored cutoff is 2024-03-10 06:00 EDT.
fn now() -> DateTime<Utc> {
    New_York.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap().with_timezone(&Utc)
}

fn cutoff() -> DateTime<Utc> {
    New_York.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap().with_timezone(&Utc)
}

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

fn record(created_at: DateTime<Utc>) -> Value {
    json!({ "timeCreated": created_at.to_rfc3339(), "url": "spiders/x.jpg" })
}

struct Fixture {
    store: Arc<MemoryStore>,
    tree: Arc<MemoryTree>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.insert("spiders/old-1.jpg", cutoff() - TimeDelta::hours(30));
        store.insert("spiders/old-2.jpg", cutoff() - TimeDelta::seconds(1));
        store.insert("spiders/fresh.jpg", cutoff() + TimeDelta::hours(2));
        store.insert("spiders/edge.jpg", cutoff());
        store.insert("thumbnails/old.jpg", cutoff() - TimeDelta::days(10));

        let tree = Arc::new(MemoryTree::new(json!({
            "spiders": {
                "-Nold": record(cutoff() - TimeDelta::hours(1)),
                "-Nfresh": record(cutoff() + TimeDelta::hours(1)),
            },
            "settings": { "lux_threshold": 25 }
        })));

        Self { store, tree }
    }

    fn job(&self, config: RetentionConfig) -> RetentionJob {
        RetentionJob::new(self.store.clone(), self.tree.clone(), config).unwrap()
    }

    fn record_keys(&self, path: &str) -> Vec<String> {
        self.tree
            .snapshot()
            .pointer(path)
            .and_then(Value::as_object)
            .map(|children| children.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[tokio::test]
async fn purges_expired_objects_and_records_with_one_cutoff() {
    let fixture = Fixture::new();

    let report = fixture.job(config()).run_at(now()).await.unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.cutoff, Some(cutoff()));
    assert_eq!(report.storage.attempted, 2);
    assert_eq!(report.storage.succeeded, 2);
    assert_eq!(report.kept_objects, 2);
    assert_eq!(report.records.succeeded, 1);
    assert_eq!(report.kept_records, 1);
    assert!(report.is_clean());

    assert_eq!(
        fixture.store.names(),
        vec!["spiders/edge.jpg", "spiders/fresh.jpg", "thumbnails/old.jpg"]
    );
    assert_eq!(fixture.record_keys("/spiders"), vec!["-Nfresh"]);
    assert!(fixture.tree.snapshot().pointer("/settings/lux_threshold").is_some());
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let fixture = Fixture::new();
    let job = fixture.job(config());

    job.run_at(now()).await.unwrap();
    let second = job.run_at(now()).await.unwrap();

    assert_eq!(second.state, JobState::Completed);
    let outcome = second.outcome();
    assert_eq!(outcome.attempted, 0);
    assert_eq!(outcome.succeeded, 0);
    assert!(outcome.failed.is_empty());
}

#[tokio::test]
async fn one_failing_object_does_not_block_the_batch_or_the_records() {
    let fixture = Fixture::new();
    fixture.store.insert("spiders/A", cutoff() - TimeDelta::hours(5));
    fixture.store.insert("spiders/B", cutoff() - TimeDelta::hours(5));
    fixture.store.insert("spiders/C", cutoff() - TimeDelta::hours(5));
    fixture.store.fail_deletes_for("spiders/B");

    let report = fixture.job(config()).run_at(now()).await.unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.storage.attempted, 5);
    assert_eq!(report.storage.succeeded, 4);
    assert_eq!(report.storage.failed_names(), vec!["spiders/B"]);
    assert!(!fixture.store.contains("spiders/A"));
    assert!(!fixture.store.contains("spiders/C"));
    assert_eq!(report.records.succeeded, 1);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn objects_and_records_without_timestamps_are_kept() {
    let fixture = Fixture::new();
    fixture.store.insert("spiders/no-meta.jpg", CreationTime::Missing);
    fixture.tree.set("spiders", "-Nbare", json!({ "url": "spiders/no-meta.jpg" }));
    fixture.tree.set("spiders", "-Ngarbled", json!({ "timeCreated": "last tuesday" }));

    let report = fixture.job(config()).run_at(now()).await.unwrap();

    assert!(fixture.store.contains("spiders/no-meta.jpg"));
    let keys = fixture.record_keys("/spiders");
    assert!(keys.contains(&"-Nbare".to_string()));
    assert!(keys.contains(&"-Ngarbled".to_string()));

    let flagged: Vec<&str> = report.anomalies.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(flagged, vec!["spiders/no-meta.jpg", "-Nbare", "-Ngarbled"]);
}

#[tokio::test]
async fn listing_failure_aborts_before_touching_records() {
    let fixture = Fixture::new();
    fixture.store.fail_listing(true);

    let err = fixture.job(config()).run_at(now()).await.unwrap_err();

    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert_eq!(fixture.record_keys("/spiders").len(), 2);
}

#[tokio::test]
async fn record_read_failure_aborts_after_storage_pass() {
    let fixture = Fixture::new();
    fixture.tree.fail_reads(true);

    let err = fixture.job(config()).run_at(now()).await.unwrap_err();

    assert!(matches!(err, Error::StoreUnavailable(StoreError::ConnectionError(_))));
    assert!(!fixture.store.contains("spiders/old-1.jpg"));
}

#[tokio::test]
async fn unreachable_blob_store_still_purges_records() {
    let fixture = Fixture::new();
    fixture.store.set_unreachable(true);

    let report = fixture.job(config()).run_at(now()).await.unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.storage.attempted, 2);
    assert_eq!(report.storage.failed.len(), 2);
    assert!(fixture.store.contains("spiders/old-1.jpg"));
    assert_eq!(report.records.succeeded, 1);
    assert_eq!(fixture.record_keys("/spiders"), vec!["-Nfresh"]);
}

#[tokio::test]
async fn rejected_record_batch_marks_every_key_failed() {
    let fixture = Fixture::new();
    fixture.tree.fail_deletes(true);

    let report = fixture.job(config()).run_at(now()).await.unwrap();

    assert_eq!(report.storage.succeeded, 2);
    assert_eq!(report.records.attempted, 1);
    assert_eq!(report.records.failed_names(), vec!["-Nold"]);
    assert!(matches!(report.records.failed[0].source, StoreError::BatchRejected(_)));
}

#[tokio::test]
async fn record_deletes_are_split_into_batches() {
    let fixture = Fixture::new();
    for i in 0..7 {
        fixture.tree.set("spiders", &format!("-Nbulk{i}"), record(cutoff() - TimeDelta::days(2)));
    }
    let mut config = config();
    config.record_batch_size = 3;

    let report = fixture.job(config).run_at(now()).await.unwrap();

    assert_eq!(report.records.attempted, 8);
    assert_eq!(report.records.succeeded, 8);
    assert_eq!(fixture.record_keys("/spiders"), vec!["-Nfresh"]);
}

#[tokio::test]
async fn invalid_policy_fails_before_any_io() {
    let fixture = Fixture::new();
    let mut config = config();
    config.policy = RetentionPolicy::FixedWindow { duration_ms: 0 };

    let err = RetentionJob::new(fixture.store.clone(), fixture.tree.clone(), config).unwrap_err();

    assert!(matches!(err, ConfigError::InvalidValue(_)));
    assert_eq!(fixture.store.len(), 5);
}

#[tokio::test]
async fn scoped_purge_everything_ignores_age() {
    let fixture = Fixture::new();
    let mut config = config();
    config.mode = PurgeMode::PurgeEverything;

    let report = fixture.job(config).run_at(now()).await.unwrap();

    assert_eq!(report.cutoff, None);
    assert_eq!(report.storage.succeeded, 4);
    assert_eq!(fixture.store.names(), vec!["thumbnails/old.jpg"]);
    assert!(fixture.tree.snapshot().pointer("/spiders").is_none());
    assert!(fixture.tree.snapshot().pointer("/settings").is_some());
}

#[tokio::test]
async fn global_purge_requires_explicit_opt_in() {
    let fixture = Fixture::new();
    let mut config = config();
    config.mode = PurgeMode::PurgeEverything;
    config.bucket_scope = Scope::Entire;
    config.tree_path = Scope::Entire;

    let refused = RetentionJob::new(fixture.store.clone(), fixture.tree.clone(), config.clone());
    assert!(matches!(refused, Err(ConfigError::UnsafeScope(_))));

    config.confirm_global_purge = true;
    let report = fixture.job(config).run_at(now()).await.unwrap();

    assert_eq!(report.storage.succeeded, 5);
    assert!(fixture.store.is_empty());
    assert_eq!(fixture.tree.snapshot(), Value::Null);
}
