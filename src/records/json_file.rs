use super::document;
use super::RecordTree;
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

/// Record tree persisted as a single JSON document, e.g. a realtime database
/// export. Every mutation rewrites the file through a temporary sibling.
pub struct JsonFileTree {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTree {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Value, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Null),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, root: &Value) -> Result<(), StoreError> {
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(root)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl RecordTree for JsonFileTree {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn read_children(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let root = self.load()?;
        Ok(document::children_at(&root, path))
    }

    async fn batch_delete(&self, path: &str, keys: &[String]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.load()?;
        let removed = document::remove_children(&mut root, path, keys);
        self.store(&root)?;
        debug!(path, requested = keys.len(), removed, "rewrote record file");
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut root = self.load()?;
        document::remove_subtree(&mut root, path);
        self.store(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree_file(contents: &Value) -> (tempfile::TempDir, JsonFileTree) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, serde_json::to_vec(contents).unwrap()).unwrap();
        (dir, JsonFileTree::new(path))
    }

    #[tokio::test]
    async fn batch_delete_persists_to_disk() {
        let (_dir, tree) = tree_file(&json!({"spiders": {"a": {}, "b": {}, "c": {}}}));

        tree.batch_delete("spiders", &["a".into(), "c".into()]).await.unwrap();

        let reread = JsonFileTree::new(tree.path.clone());
        let children = reread.read_children("spiders").await.unwrap();
        assert_eq!(children.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = JsonFileTree::new(dir.path().join("absent.json"));
        assert!(tree.read_children("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_payload_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, b"{not json").unwrap();

        let err = JsonFileTree::new(path).read_children("").await.unwrap_err();
        assert!(matches!(err, StoreError::Payload(_)));
    }

    #[tokio::test]
    async fn delete_subtree_at_root_empties_document() {
        let (_dir, tree) = tree_file(&json!({"spiders": {"a": {}}, "other": 1}));
        tree.delete_subtree("").await.unwrap();
        assert!(tree.read_children("").await.unwrap().is_empty());
    }
}
