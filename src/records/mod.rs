pub mod document;
mod firebase;
mod json_file;
mod memory;

pub use firebase::FirebaseTree;
pub use json_file::JsonFileTree;
pub use memory::MemoryTree;

use crate::config::RecordSettings;
use crate::error::StoreError;
use crate::retention::{Aged, CreationTime};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A hierarchical key-value store addressed by `/`-separated paths. The empty
/// path is the root of the tree.
#[async_trait]
pub trait RecordTree: Send + Sync {
    fn describe(&self) -> String;

    /// Direct children of `path`. A missing or scalar node has no children.
    async fn read_children(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Removes `keys` under `path` in one update.
    async fn batch_delete(&self, path: &str, keys: &[String]) -> Result<(), StoreError>;

    async fn delete_subtree(&self, path: &str) -> Result<(), StoreError>;
}

/// One child record with the creation timestamp it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub key: String,
    pub created_at: CreationTime,
}

impl RecordEntry {
    pub fn from_value(key: String, value: &Value, created_at_field: &str) -> Self {
        Self {
            key,
            created_at: CreationTime::from_json(value.get(created_at_field)),
        }
    }
}

impl Aged for RecordEntry {
    fn name(&self) -> &str {
        &self.key
    }

    fn created_at(&self) -> &CreationTime {
        &self.created_at
    }
}

pub fn build_record_tree(settings: &RecordSettings) -> Result<Arc<dyn RecordTree>, StoreError> {
    let tree: Arc<dyn RecordTree> = match settings {
        RecordSettings::Firebase {
            database_url,
            auth_token,
            request_timeout_secs,
        } => Arc::new(FirebaseTree::new(
            database_url,
            auth_token.clone(),
            Duration::from_secs(*request_timeout_secs),
        )?),
        RecordSettings::JsonFile { path } => Arc::new(JsonFileTree::new(path.clone())),
    };
    Ok(tree)
}
