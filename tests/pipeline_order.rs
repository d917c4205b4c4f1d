mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{value, Fixture};
use serde_json::json;
use treestore::{Action, Flow, Path, StoreError, Value};

/// Append `entry` to the `log` list of the tree.
fn log(state: &Value, entry: &str) -> Result<Value, StoreError> {
    let path = Path::from("log");
    let mut entries = state.list_in(&path)?.as_ref().clone();
    entries.push(Value::from(entry));
    state.set_in(&path, Value::from(entries))
}

#[test]
fn test_processors_run_in_registration_order() {
    let store = Fixture::new(json!({}));
    store.register_processor("tick", |state: &Value, _: &Action| log(state, "first"));
    store.register_processor("tick", |state: &Value, _: &Action| log(state, "second"));
    store.register_global_processor(|state: &Value, _: &Action| log(state, "global"));

    store.dispatch(Action::custom("tick", Value::Null)).unwrap();

    assert_eq!(store.peek_key("log"), Some(value(json!(["first", "second", "global"]))));
}

#[test]
fn test_processors_only_see_matching_types() {
    let store = Fixture::new(json!({}));
    store.register_processor("tick", |state: &Value, _: &Action| log(state, "tick"));

    store.dispatch(Action::custom("tock", Value::Null)).unwrap();
    assert_eq!(store.peek_key("log"), None);
}

#[test]
fn test_pre_processor_rewrites_action() {
    let store = Fixture::new(json!({}));
    store.register_pre_processor("rename", |_: &Value, action: Action| {
        Action::set_in("renamed", action.payload())
    });

    store.dispatch(Action::custom("rename", "bob")).unwrap();

    assert_eq!(store.peek_key("renamed"), Some(Value::from("bob")));
}

#[test]
fn test_pre_processors_match_the_rewritten_type() {
    let store = Fixture::new(json!({}));
    store.register_pre_processor("a", |_: &Value, _: Action| Action::custom("b", 1));
    store.register_pre_processor("b", |_: &Value, action: Action| {
        Action::set_in("seen", action.payload())
    });

    store.dispatch(Action::custom("a", Value::Null)).unwrap();

    assert_eq!(store.peek_key("seen"), Some(Value::from(1)));
}

#[test]
fn test_pre_processor_stop_skips_data_reduction() {
    let store = Fixture::new(json!({"a": 0}));
    store.register_pre_processor("@@set-in", |_: &Value, action: Action| Flow::Stop(action));

    store.set_in("a", 1).unwrap();

    assert_eq!(store.peek_key("a"), Some(Value::from(0)));
}

#[test]
fn test_processor_stop_skips_later_processors() {
    let store = Fixture::new(json!({}));
    store.register_processor("tick", |state: &Value, _: &Action| {
        log(state, "first").map(Flow::Stop)
    });
    store.register_processor("tick", |state: &Value, _: &Action| log(state, "second"));

    store.dispatch(Action::custom("tick", Value::Null)).unwrap();

    assert_eq!(store.peek_key("log"), Some(value(json!(["first"]))));
}

#[test]
fn test_pause_resume_remove() {
    let store = Fixture::new(json!({}));
    let handle = store.register_processor("tick", |state: &Value, _: &Action| log(state, "tick"));

    handle.pause();
    assert!(handle.is_paused());
    store.dispatch(Action::custom("tick", Value::Null)).unwrap();
    assert_eq!(store.peek_key("log"), None);

    handle.resume();
    store.dispatch(Action::custom("tick", Value::Null)).unwrap();
    assert_eq!(store.peek_key("log"), Some(value(json!(["tick"]))));

    handle.remove();
    handle.remove();
    assert!(!handle.is_registered());
    store.dispatch(Action::custom("tick", Value::Null)).unwrap();
    assert_eq!(store.peek_key("log"), Some(value(json!(["tick"]))));
}

#[test]
fn test_handler_counts() {
    let store = Fixture::new(json!({}));
    let before = store.handler_counts();

    let pre = store.register_global_pre_processor(|_: &Value, action: Action| action);
    store.register_processor("x", |state: &Value, _: &Action| state.clone());

    let after = store.handler_counts();
    assert_eq!(after.pre_processors, before.pre_processors + 1);
    assert_eq!(after.processors, before.processors + 1);

    pre.remove();
    assert_eq!(store.handler_counts().pre_processors, before.pre_processors);
}

#[test]
fn test_reentrant_dispatch_is_queued_behind_current_pass() {
    let store = Fixture::new(json!({}));
    let weak = store.downgrade();
    store.register_processor("first", move |state: &Value, _: &Action| {
        if let Some(store) = weak.upgrade() {
            store.dispatch(Action::custom("second", Value::Null))?;
        }
        log(state, "first")
    });
    store.register_processor("second", |state: &Value, _: &Action| log(state, "second"));

    store.dispatch(Action::custom("first", Value::Null)).unwrap();

    assert_eq!(store.peek_key("log"), Some(value(json!(["first", "second"]))));
}

#[test]
fn test_failed_pass_discards_queue_and_keeps_pipeline_usable() {
    let store = Fixture::new(json!({"a": 0}));
    let weak = store.downgrade();
    store.register_processor("boom", move |_: &Value, _: &Action| -> Result<Value, StoreError> {
        if let Some(store) = weak.upgrade() {
            store.dispatch(Action::set_in("later", true))?;
        }
        Err(StoreError::rejected("nope"))
    });

    let err = store.dispatch(Action::custom("boom", Value::Null)).unwrap_err();
    assert_eq!(err, StoreError::Rejected("nope".to_string()));
    assert_eq!(store.peek_key("later"), None);

    store.set_in("a", 1).unwrap();
    assert_eq!(store.peek_key("a"), Some(Value::from(1)));
}

#[test]
fn test_panicking_reducer_does_not_wedge_the_pipeline() {
    let store = Fixture::new(json!({}));
    store.register_processor("panic", |_: &Value, _: &Action| -> Value { panic!("reducer bug") });

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _ = store.dispatch(Action::custom("panic", Value::Null));
    }));
    assert!(outcome.is_err());

    store.set_in("after", 1).unwrap();
    assert_eq!(store.peek_key("after"), Some(Value::from(1)));
}

#[test]
fn test_completed_store_rejects_dispatch() {
    let store = Fixture::new(json!({}));
    store.complete();
    store.complete();

    assert!(store.is_completed());
    assert_eq!(store.set_in("a", 1).unwrap_err(), StoreError::Completed);
}
