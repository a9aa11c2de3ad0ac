mod local_storage;
mod memory;
mod s3_storage;

pub use local_storage::{LocalStorage, TimestampSource};
pub use memory::MemoryStore;
pub use s3_storage::S3Storage;

use crate::config::StorageSettings;
use crate::error::StoreError;
use crate::retention::{Aged, CreationTime, Scope};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Snapshot of one object taken at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub name: String,
    pub created_at: CreationTime,
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>, created_at: impl Into<CreationTime>) -> Self {
        Self {
            name: name.into(),
            created_at: created_at.into(),
        }
    }
}

impl Aged for ObjectDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> &CreationTime {
        &self.created_at
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Human readable identity used in logs and errors.
    fn describe(&self) -> String;

    /// Confirms the store is reachable before a batch is issued.
    async fn check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Lists every object whose name starts with `prefix`, or the whole store
    /// when `prefix` is `None`. Either the complete listing is returned or an
    /// error; never a partial page.
    async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectDescriptor>, StoreError>;

    async fn delete_object(&self, name: &str) -> Result<(), StoreError>;
}

/// Lists a store within a fixed scope. Every call re-queries the store.
pub struct ObjectLister<'a> {
    store: &'a dyn BlobStore,
    scope: &'a Scope,
}

impl<'a> ObjectLister<'a> {
    pub fn new(store: &'a dyn BlobStore, scope: &'a Scope) -> Self {
        Self { store, scope }
    }

    pub async fn list(&self) -> Result<Vec<ObjectDescriptor>, StoreError> {
        let objects = self.store.list_objects(self.scope.path()).await?;
        debug!(
            store = %self.store.describe(),
            scope = %self.scope,
            count = objects.len(),
            "listed objects"
        );
        Ok(objects)
    }
}

pub async fn build_blob_store(settings: &StorageSettings) -> Result<Arc<dyn BlobStore>, StoreError> {
    let store: Arc<dyn BlobStore> = match settings {
        StorageSettings::S3 {
            bucket,
            region,
            endpoint_url,
            force_path_style,
            request_timeout_secs,
        } => Arc::new(
            S3Storage::new(
                region.clone(),
                bucket.clone(),
                endpoint_url.clone(),
                *force_path_style,
                Duration::from_secs(*request_timeout_secs),
            )
            .await?,
        ),
        StorageSettings::Local { root, timestamp_source } => {
            Arc::new(LocalStorage::new(root.clone(), *timestamp_source)?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn lister_requeries_the_store_on_each_call() {
        let store = MemoryStore::new();
        store.insert("spiders/a.jpg", Utc::now());
        let scope = Scope::Within("spiders/".into());
        let lister = ObjectLister::new(&store, &scope);

        assert_eq!(lister.list().await.unwrap().len(), 1);

        store.insert("spiders/b.jpg", Utc::now());
        store.insert("other/c.jpg", Utc::now());
        assert_eq!(lister.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lister_fails_whole_listing_on_store_error() {
        let store = MemoryStore::new();
        store.insert("a", Utc::now());
        store.fail_listing(true);
        let scope = Scope::Entire;

        let err = ObjectLister::new(&store, &scope).list().await.unwrap_err();
        assert!(matches!(err, StoreError::ConnectionError(_)));
    }
}
