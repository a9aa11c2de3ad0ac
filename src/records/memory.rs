use super::document;
use super::RecordTree;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process record tree with fault injection.
#[derive(Debug, Default)]
pub struct MemoryTree {
    root: Mutex<Value>,
    reads_fail: AtomicBool,
    deletes_fail: AtomicBool,
}

impl MemoryTree {
    pub fn new(root: Value) -> Self {
        Self {
            root: Mutex::new(root),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.reads_fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.deletes_fail.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Value {
        self.root().clone()
    }

    pub fn set(&self, path: &str, key: &str, value: Value) {
        let mut root = self.root();
        let mut node = &mut *root;
        for segment in document::segments(path).into_iter().chain(std::iter::once(key)) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(object) = node else {
                unreachable!("node was just made an object");
            };
            node = object.entry(segment).or_insert(Value::Null);
        }
        *node = value;
    }

    fn root(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard_deletes(&self) -> Result<(), StoreError> {
        if self.deletes_fail.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied("memory tree is read only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordTree for MemoryTree {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn read_children(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError("memory tree reads disabled".into()));
        }
        Ok(document::children_at(&self.root(), path))
    }

    async fn batch_delete(&self, path: &str, keys: &[String]) -> Result<(), StoreError> {
        self.guard_deletes()?;
        document::remove_children(&mut self.root(), path, keys);
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> Result<(), StoreError> {
        self.guard_deletes()?;
        document::remove_subtree(&mut self.root(), path);
        Ok(())
    }
}
