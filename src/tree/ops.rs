//! Copy-on-write update primitives.
//!
//! Every operation takes `&self` and returns a new root. Nodes off the
//! written path are shared with the input; a write that does not change
//! anything returns a clone of the input root, so `same()` holds.

use std::sync::Arc;

use super::Value;
use crate::error::StoreError;
use crate::path::Path;

impl Value {
    /// Value at `path`, or `None` when any segment is missing.
    ///
    /// A segment addressing a list is parsed as a zero-based index.
    pub fn get_in(&self, path: &Path) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| match node {
                Value::Map(map) => map.get(segment),
                Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Write `value` at `path`, creating intermediate maps where nothing
    /// exists yet.
    pub fn set_in(&self, path: &Path, value: Value) -> Result<Value, StoreError> {
        self.set_at(path.segments(), value, path)
    }

    fn set_at(&self, segments: &[String], value: Value, full: &Path) -> Result<Value, StoreError> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(value);
        };

        match self {
            Value::Map(map) => {
                let child = map.get(head);
                let next = child.unwrap_or(&Value::Null).set_at(rest, value, full)?;
                if child.is_some_and(|c| c.same(&next)) {
                    return Ok(self.clone());
                }
                let mut map = Arc::clone(map);
                Arc::make_mut(&mut map).insert(head.clone(), next);
                Ok(Value::Map(map))
            }
            Value::List(items) => {
                let index = head.parse::<usize>().map_err(|_| StoreError::InvalidPath {
                    path: full.clone(),
                    reason: format!("'{head}' is not a list index"),
                })?;
                if index > items.len() {
                    return Err(StoreError::InvalidPath {
                        path: full.clone(),
                        reason: format!("index {index} out of bounds for list of {}", items.len()),
                    });
                }
                let child = items.get(index);
                let next = child.unwrap_or(&Value::Null).set_at(rest, value, full)?;
                if child.is_some_and(|c| c.same(&next)) {
                    return Ok(self.clone());
                }
                let mut items = Arc::clone(items);
                let list = Arc::make_mut(&mut items);
                if index == list.len() {
                    list.push(next);
                } else {
                    list[index] = next;
                }
                Ok(Value::List(items))
            }
            Value::Null => Value::map().set_at(segments, value, full),
            other => Err(StoreError::InvalidPath {
                path: full.clone(),
                reason: format!("cannot descend into {} at '{head}'", other.kind_name()),
            }),
        }
    }

    /// Replace the value at `path` with `f(current)`.
    pub fn update_in<F>(&self, path: &Path, f: F) -> Result<Value, StoreError>
    where
        F: FnOnce(Option<&Value>) -> Result<Value, StoreError>,
    {
        let current = self.get_in(path);
        let next = f(current)?;
        if current.is_some_and(|c| c.same(&next)) {
            return Ok(self.clone());
        }
        self.set_in(path, next)
    }

    /// Deep merge: maps merge key by key, any other pairing takes `patch`.
    pub fn merge_deep(&self, patch: &Value) -> Value {
        match (self, patch) {
            (Value::Map(base), Value::Map(incoming)) => {
                let mut merged = Arc::clone(base);
                for (key, value) in incoming.iter() {
                    let existing = base.get(key);
                    let next = match existing {
                        Some(existing) => existing.merge_deep(value),
                        None => value.clone(),
                    };
                    if existing.is_some_and(|e| e.same(&next)) {
                        continue;
                    }
                    Arc::make_mut(&mut merged).insert(key.clone(), next);
                }
                Value::Map(merged)
            }
            _ => patch.clone(),
        }
    }

    /// Deep merge `patch` into the value at `path`.
    pub fn merge_deep_in(&self, path: &Path, patch: &Value) -> Result<Value, StoreError> {
        self.update_in(path, |current| {
            Ok(match current {
                Some(current) => current.merge_deep(patch),
                None => patch.clone(),
            })
        })
    }

    /// Remove `key` from the map at `path`. Absent or null targets are left alone.
    pub fn remove_key_in(&self, path: &Path, key: &str) -> Result<Value, StoreError> {
        match self.get_in(path) {
            None | Some(Value::Null) => Ok(self.clone()),
            Some(Value::Map(map)) => {
                if !map.contains_key(key) {
                    return Ok(self.clone());
                }
                let mut map = Arc::clone(map);
                Arc::make_mut(&mut map).remove(key);
                self.set_in(path, Value::Map(map))
            }
            Some(other) => Err(StoreError::TypeMismatch {
                path: path.clone(),
                expected: "map",
                found: other.kind_name(),
            }),
        }
    }

    /// The list at `path`; absent and null read as an empty list.
    pub fn list_in(&self, path: &Path) -> Result<Arc<Vec<Value>>, StoreError> {
        match self.get_in(path) {
            None | Some(Value::Null) => Ok(Arc::new(Vec::new())),
            Some(Value::List(items)) => Ok(Arc::clone(items)),
            Some(other) => Err(StoreError::TypeMismatch {
                path: path.clone(),
                expected: "list",
                found: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        Value::from(json!({
            "users": {"alice": {"age": 30}, "bob": {"age": 25}},
            "tags": ["a", "b"]
        }))
    }

    #[test]
    fn get_in_walks_maps_and_lists() {
        let tree = tree();
        assert_eq!(
            tree.get_in(&Path::from("users.alice.age")),
            Some(&Value::from(30))
        );
        assert_eq!(tree.get_in(&Path::from("tags.1")), Some(&Value::from("b")));
        assert_eq!(tree.get_in(&Path::from("tags.x")), None);
        assert_eq!(tree.get_in(&Path::from("missing.deep")), None);
        assert!(tree.get_in(&Path::root()).is_some_and(|v| v.same(&tree)));
    }

    #[test]
    fn set_in_shares_untouched_subtrees() {
        let before = tree();
        let after = before
            .set_in(&Path::from("users.alice.age"), Value::from(31))
            .unwrap();

        assert_eq!(
            after.get_in(&Path::from("users.alice.age")),
            Some(&Value::from(31))
        );
        let bob = Path::from("users.bob");
        assert!(before.get_in(&bob).unwrap().same(after.get_in(&bob).unwrap()));
        let tags = Path::from("tags");
        assert!(before.get_in(&tags).unwrap().same(after.get_in(&tags).unwrap()));
        assert_eq!(
            before.get_in(&Path::from("users.alice.age")),
            Some(&Value::from(30))
        );
    }

    #[test]
    fn unchanged_write_keeps_identity() {
        let before = tree();
        let after = before
            .set_in(&Path::from("users.alice.age"), Value::from(30))
            .unwrap();
        assert!(before.same(&after));
    }

    #[test]
    fn set_in_creates_intermediate_maps() {
        let after = Value::Null
            .set_in(&Path::from("a.b.c"), Value::from(1))
            .unwrap();
        assert_eq!(after, Value::from(json!({"a": {"b": {"c": 1}}})));
    }

    #[test]
    fn set_in_appends_at_list_end() {
        let after = tree()
            .set_in(&Path::from("tags.2"), Value::from("c"))
            .unwrap();
        assert_eq!(
            after.get_in(&Path::from("tags")),
            Some(&Value::from(json!(["a", "b", "c"])))
        );
        assert!(matches!(
            tree().set_in(&Path::from("tags.9"), Value::Null),
            Err(StoreError::InvalidPath { .. })
        ));
    }

    #[test]
    fn set_in_refuses_to_descend_into_scalars() {
        let err = tree()
            .set_in(&Path::from("users.alice.age.years"), Value::from(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[test]
    fn merge_deep_merges_maps_and_replaces_the_rest() {
        let base = Value::from(json!({"a": {"x": 1, "y": 2}, "list": [1, 2]}));
        let patch = Value::from(json!({"a": {"y": 3, "z": 4}, "list": [9]}));
        assert_eq!(
            base.merge_deep(&patch),
            Value::from(json!({"a": {"x": 1, "y": 3, "z": 4}, "list": [9]}))
        );
    }

    #[test]
    fn merge_deep_without_changes_keeps_identity() {
        let base = tree();
        let patch = Value::from(json!({"users": {"alice": {"age": 30}}}));
        assert!(base.merge_deep(&patch).same(&base));
    }

    #[test]
    fn remove_key_in_handles_absent_and_mismatched_targets() {
        let base = tree();
        let after = base.remove_key_in(&Path::from("users"), "bob").unwrap();
        assert_eq!(after.get_in(&Path::from("users.bob")), None);

        assert!(base
            .remove_key_in(&Path::from("nothing"), "x")
            .unwrap()
            .same(&base));
        assert!(matches!(
            base.remove_key_in(&Path::from("tags"), "0"),
            Err(StoreError::TypeMismatch { expected: "map", found: "list", .. })
        ));
    }

    #[test]
    fn list_in_treats_absent_as_empty() {
        let base = tree();
        assert!(base.list_in(&Path::from("missing")).unwrap().is_empty());
        assert_eq!(base.list_in(&Path::from("tags")).unwrap().len(), 2);
        assert!(matches!(
            base.list_in(&Path::from("users")),
            Err(StoreError::TypeMismatch { expected: "list", found: "map", .. })
        ));
    }
}
