mod common;

use common::{value, Fixture};
use serde_json::json;
use treestore::{Action, Path, StoreError, Value};

#[test]
fn test_null_initial_state_becomes_empty_map() {
    let store = Fixture::new(serde_json::Value::Null);
    assert_eq!(store.peek(), Value::map());
}

#[test]
fn test_set_in_creates_intermediate_maps() {
    let store = Fixture::new(json!({}));
    store.set_in("a.b.c", 1).unwrap();

    assert_eq!(store.peek(), value(json!({"a": {"b": {"c": 1}}})));
    assert_eq!(store.peek_key("a.b.c"), Some(Value::from(1)));
}

#[test]
fn test_set_replaces_whole_tree() {
    let store = Fixture::new(json!({"old": true}));
    store.set(value(json!({"new": 1}))).unwrap();
    assert_eq!(store.peek(), value(json!({"new": 1})));
}

#[test]
fn test_patch_merges_deeply() {
    let store = Fixture::new(json!({"user": {"name": "ann", "prefs": {"theme": "dark", "lang": "en"}}}));
    store
        .patch("user", value(json!({"prefs": {"lang": "fr"}, "age": 4})))
        .unwrap();

    assert_eq!(
        store.peek_key("user"),
        Some(value(json!({"name": "ann", "age": 4, "prefs": {"theme": "dark", "lang": "fr"}})))
    );
}

#[test]
fn test_apply_sees_current_value() {
    let store = Fixture::new(json!({"counter": 41}));
    store
        .apply("counter", |current| {
            Value::from(current.and_then(Value::as_i64).unwrap_or(0) + 1)
        })
        .unwrap();
    store
        .apply("fresh", |current| Value::from(current.is_none()))
        .unwrap();

    assert_eq!(store.peek_key("counter"), Some(Value::from(42)));
    assert_eq!(store.peek_key("fresh"), Some(Value::from(true)));
}

#[test]
fn test_delete_removes_key_and_ignores_absent_targets() {
    let store = Fixture::new(json!({"users": {"a": 1, "b": 2}}));
    store.delete("users", "a").unwrap();
    store.delete("nowhere", "a").unwrap();
    store.delete("users", "missing").unwrap();

    assert_eq!(store.peek(), value(json!({"users": {"b": 2}})));
}

#[test]
fn test_delete_on_a_list_is_a_type_mismatch() {
    let store = Fixture::new(json!({"xs": [1]}));
    let err = store.delete("xs", "0").unwrap_err();
    assert_eq!(
        err,
        StoreError::TypeMismatch {
            path: Path::from("xs"),
            expected: "map",
            found: "list",
        }
    );
    assert_eq!(store.peek(), value(json!({"xs": [1]})));
}

#[test]
fn test_list_verbs() {
    let store = Fixture::new(json!({"xs": [3, 1, 2]}));

    store.list_push("xs", vec![Value::from(5)]).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([3, 1, 2, 5]))));

    store.list_pop("xs").unwrap();
    store.list_shift("xs").unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([1, 2]))));

    store.list_unshift("xs", vec![Value::from(0)]).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([0, 1, 2]))));

    store.list_splice("xs", 1, 1, vec![Value::from(7), Value::from(8)]).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([0, 7, 8, 2]))));

    store.list_sort("xs").unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([0, 2, 7, 8]))));

    store.list_sort_by("xs", |a, b| b.compare(a)).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([8, 7, 2, 0]))));

    store
        .list_filter("xs", |item, _, _| item.as_i64().is_some_and(|n| n % 2 == 0))
        .unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([8, 2, 0]))));
}

#[test]
fn test_list_helpers() {
    let store = Fixture::new(json!({"xs": ["a", "b", "c"]}));

    store.list_insert("xs", 1, vec![Value::from("z")]).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!(["a", "z", "b", "c"]))));

    store.list_remove_at("xs", -1, 1).unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!(["a", "z", "b"]))));

    store
        .list_remove_find("xs", |item, _, _| item.as_str() == Some("z"))
        .unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!(["a", "b"]))));

    // No match dispatches nothing.
    store
        .list_remove_find("xs", |item, _, _| item.as_str() == Some("q"))
        .unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!(["a", "b"]))));
}

#[test]
fn test_list_remove_find_n_removes_a_run() {
    let store = Fixture::new(json!({"xs": [1, 2, 3, 4, 5]}));

    store
        .list_remove_find_n("xs", |item, _, _| item.as_i64() == Some(2), 2)
        .unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([1, 4, 5]))));

    // The count clamps at the end of the list.
    store
        .list_remove_find_n("xs", |_, index, _| index == 1, 10)
        .unwrap();
    assert_eq!(store.peek_key("xs"), Some(value(json!([1]))));
}

#[test]
fn test_list_verbs_on_absent_path_start_from_empty_list() {
    let store = Fixture::new(json!({}));
    store.list_pop("queue").unwrap();
    assert_eq!(store.peek_key("queue"), Some(value(json!([]))));

    store.list_push("items", vec![Value::from(1)]).unwrap();
    assert_eq!(store.peek_key("items"), Some(value(json!([1]))));
}

#[test]
fn test_list_verb_on_map_is_a_type_mismatch() {
    let store = Fixture::new(json!({"xs": {"a": 1}}));
    let err = store.list_push("xs", vec![Value::from(1)]).unwrap_err();
    assert!(matches!(err, StoreError::TypeMismatch { expected: "list", found: "map", .. }));
}

#[test]
fn test_relative_tokens_are_resolved() {
    let store = Fixture::new(json!({}));
    store.set_in(["a", "b", "..", "c"], 1).unwrap();
    store.set_in(["x", "~", "y"], 2).unwrap();
    store.set_in(["p", ".", "q"], 3).unwrap();

    assert_eq!(store.peek(), value(json!({"a": {"c": 1}, "y": 2, "p": {"q": 3}})));
    assert_eq!(store.peek_key(["a", "zzz", "..", "c"]), Some(Value::from(1)));
}

#[test]
fn test_list_index_segments() {
    let store = Fixture::new(json!({"rows": [{"v": 1}, {"v": 2}]}));
    store.set_in("rows.1.v", 20).unwrap();
    assert_eq!(store.peek_key("rows.1.v"), Some(Value::from(20)));
    assert_eq!(store.peek_key("rows.0.v"), Some(Value::from(1)));
}

#[test]
fn test_writing_through_a_scalar_fails() {
    let store = Fixture::new(json!({"n": 1}));
    let err = store.set_in("n.deeper", 2).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPath { .. }));
    assert_eq!(store.peek(), value(json!({"n": 1})));
}

#[test]
fn test_untouched_subtrees_are_shared() {
    let store = Fixture::new(json!({"a": {"big": [1, 2, 3]}, "b": 0}));
    let before = store.peek();
    store.set_in("b", 1).unwrap();
    let after = store.peek();

    let a = Path::from("a");
    assert!(before.get_in(&a).unwrap().same(after.get_in(&a).unwrap()));
    assert_eq!(before.get("b"), Some(&Value::from(0)));
}

#[test]
fn test_dispatch_type_reads_verbs_from_data() {
    let store = Fixture::new(json!({}));
    store
        .dispatch_type("@@set-in", value(json!({"path": "a.b", "value": 3})))
        .unwrap();
    store
        .dispatch_type("@@list-push", value(json!({"path": ["xs"], "items": [1, 2]})))
        .unwrap();

    assert_eq!(store.peek(), value(json!({"a": {"b": 3}, "xs": [1, 2]})));
}

#[test]
fn test_custom_action_leaves_state_untouched_without_processors() {
    let store = Fixture::new(json!({"a": 1}));
    let before = store.peek();
    store.dispatch(Action::custom("user/noop", 5)).unwrap();
    assert!(store.peek().same(&before));
}

#[test]
fn test_closure_verbs_cannot_be_built_from_data() {
    let store = Fixture::new(json!({}));
    let err = store.dispatch_type("@@apply", value(json!({"path": "a"}))).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPayload { .. }));
}
