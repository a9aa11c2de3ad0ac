use super::{BlobStore, ObjectDescriptor};
use crate::error::StoreError;
use crate::retention::CreationTime;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Which filesystem timestamp stands in for the creation instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    #[default]
    Created,
    Modified,
}

/// A directory tree treated as a bucket. Object names are `/`-separated paths
/// relative to the root.
pub struct LocalStorage {
    root: PathBuf,
    timestamp_source: TimestampSource,
}

impl LocalStorage {
    pub fn new(root: PathBuf, timestamp_source: TimestampSource) -> Result<Self, StoreError> {
        fs::create_dir_all(&root)?;
        info!("Using local blob store at {:?}", root);
        Ok(Self { root, timestamp_source })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn creation_time(&self, metadata: &fs::Metadata) -> CreationTime {
        let timestamp = match self.timestamp_source {
            TimestampSource::Created => metadata.created(),
            TimestampSource::Modified => metadata.modified(),
        };
        match timestamp {
            Ok(time) => CreationTime::Known(DateTime::<Utc>::from(time)),
            Err(_) => CreationTime::Missing,
        }
    }

    fn walk(&self, dir: &Path, objects: &mut Vec<ObjectDescriptor>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                self.walk(&path, objects)?;
                continue;
            }

            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            objects.push(ObjectDescriptor::new(name, self.creation_time(&metadata)));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn check(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::NotFound(self.root.display().to_string()))
        }
    }

    async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectDescriptor>, StoreError> {
        let mut objects = Vec::new();
        self.walk(&self.root, &mut objects)?;
        if let Some(prefix) = prefix {
            objects.retain(|object| object.name.starts_with(prefix));
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn delete_object(&self, name: &str) -> Result<(), StoreError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(name.to_string()),
            _ => StoreError::Local(e),
        })?;
        debug!("Removed local object: {:?}", path);
        Ok(())
    }
}
