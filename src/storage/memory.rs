use super::{BlobStore, ObjectDescriptor};
use crate::error::StoreError;
use crate::retention::CreationTime;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process blob store with fault injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, CreationTime>>,
    failing_deletes: Mutex<HashSet<String>>,
    listing_fails: AtomicBool,
    unreachable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, created_at: impl Into<CreationTime>) {
        self.objects().insert(name.into(), created_at.into());
    }

    /// Makes every delete of `name` fail while leaving the object in place.
    pub fn fail_deletes_for(&self, name: impl Into<String>) {
        lock(&self.failing_deletes).insert(name.into());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.listing_fails.store(fail, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, CreationTime>> {
        lock(&self.objects)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn check(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError("memory store marked unreachable".into()));
        }
        Ok(())
    }

    async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectDescriptor>, StoreError> {
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError("memory store listing disabled".into()));
        }
        Ok(self
            .objects()
            .iter()
            .filter(|(name, _)| prefix.map_or(true, |prefix| name.starts_with(prefix)))
            .map(|(name, created_at)| ObjectDescriptor::new(name.clone(), created_at.clone()))
            .collect())
    }

    async fn delete_object(&self, name: &str) -> Result<(), StoreError> {
        if lock(&self.failing_deletes).contains(name) {
            return Err(StoreError::PermissionDenied(name.to_string()));
        }
        self.objects()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
