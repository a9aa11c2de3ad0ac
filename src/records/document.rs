//! Path navigation over a JSON document shaped like a realtime database.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

pub fn node_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn object_at_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Map<String, Value>> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))?
        .as_object_mut()
}

pub fn children_at(root: &Value, path: &str) -> BTreeMap<String, Value> {
    match node_at(root, path) {
        Some(Value::Object(children)) => children.clone().into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

/// Removes `keys` below `path`. Returns how many were present.
pub fn remove_children(root: &mut Value, path: &str, keys: &[String]) -> usize {
    let Some(children) = object_at_mut(root, path) else {
        return 0;
    };
    keys.iter().filter(|key| children.remove(key.as_str()).is_some()).count()
}

/// Removes the node at `path`; the root path clears the whole document.
pub fn remove_subtree(root: &mut Value, path: &str) {
    let mut parts = segments(path);
    let Some(last) = parts.pop() else {
        *root = Value::Null;
        return;
    };
    if let Some(parent) = object_at_mut(root, &parts.join("/")) {
        parent.remove(last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "spiders": {
                "-N1": {"timeCreated": "2024-01-01T00:00:00Z"},
                "-N2": {"timeCreated": "2024-06-01T00:00:00Z"}
            },
            "settings": {"threshold": 25}
        })
    }

    #[test]
    fn reads_children_with_sloppy_slashes() {
        let root = tree();
        assert_eq!(children_at(&root, "/spiders/").len(), 2);
        assert_eq!(children_at(&root, "").len(), 2);
        assert!(children_at(&root, "spiders/-N1/timeCreated").is_empty());
        assert!(children_at(&root, "nowhere").is_empty());
    }

    #[test]
    fn removes_only_listed_children() {
        let mut root = tree();
        let removed = remove_children(&mut root, "spiders", &["-N1".into(), "-N9".into()]);
        assert_eq!(removed, 1);
        assert_eq!(children_at(&root, "spiders").keys().collect::<Vec<_>>(), vec!["-N2"]);
    }

    #[test]
    fn removes_subtrees_and_root() {
        let mut root = tree();
        remove_subtree(&mut root, "spiders");
        assert!(node_at(&root, "spiders").is_none());
        assert!(node_at(&root, "settings/threshold").is_some());

        remove_subtree(&mut root, "/");
        assert_eq!(root, Value::Null);
    }
}
