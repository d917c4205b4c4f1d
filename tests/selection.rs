mod common;

use std::time::Duration;

use common::{next_item, value, Fixture};
use futures::StreamExt;
use serde_json::json;
use treestore::{Action, SelectSettings, Store, Value};

#[tokio::test]
async fn test_select_starts_with_current_value_and_skips_repeats() {
    let store = Fixture::new(json!({"a": 0, "b": 0}));
    let mut values = store.select("a");

    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(0))));

    store.set_in("b", 1).unwrap();
    store.set_in("a", 0).unwrap();
    store.set_in("a", 1).unwrap();

    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(1))));
}

#[tokio::test]
async fn test_select_reports_absent_values() {
    let store = Fixture::new(json!({"a": 1}));
    let mut values = store.select("a");
    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(1))));

    store.delete("", "a").unwrap();
    assert_eq!(next_item(&mut values).await, Some(None));
}

#[tokio::test]
async fn test_select_resolves_relative_paths() {
    let store = Fixture::new(json!({"a": {"b": 5}}));
    let mut values = store.select(["a", "x", "..", "b"]);
    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(5))));
}

#[tokio::test]
async fn test_settings_apply_filter_map_filter() {
    let store = Fixture::new(json!({}));
    let settings = SelectSettings::<Option<Value>>::new()
        .pre_filter(|item: &Option<Value>| item.is_some())
        .map(|item: Option<Value>, _: &Store| item.and_then(|v| v.as_i64()).unwrap_or(-1))
        .post_filter(|n: &i64| n % 2 == 0);
    let mut values = store.select_with("n", settings);

    for n in [1, 2, 3, 4] {
        store.set_in("n", n).unwrap();
    }
    store.set_in("n", "text").unwrap();
    store.set_in("n", 6).unwrap();

    assert_eq!(next_item(&mut values).await, Some(2));
    assert_eq!(next_item(&mut values).await, Some(4));
    assert_eq!(next_item(&mut values).await, Some(6));
}

#[tokio::test]
async fn test_map_receives_the_store() {
    let store = Fixture::new(json!({"n": 2, "factor": 10}));
    let settings = SelectSettings::<Option<Value>>::new().map(|item: Option<Value>, store: &Store| {
        let factor = store.peek_key("factor").and_then(|f| f.as_i64()).unwrap_or(1);
        item.and_then(|v| v.as_i64()).map(|n| n * factor)
    });
    let mut values = store.select_with("n", settings);

    assert_eq!(next_item(&mut values).await, Some(Some(20)));
}

#[tokio::test(start_paused = true)]
async fn test_debounce_emits_last_value_of_a_burst() {
    let store = Fixture::new(json!({"n": 0}));
    let settings = SelectSettings::<Option<Value>>::new().debounce(Duration::from_millis(50));
    let mut values = store.select_with("n", settings);

    store.set_in("n", 1).unwrap();
    store.set_in("n", 2).unwrap();
    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(2))));

    store.set_in("n", 3).unwrap();
    assert_eq!(next_item(&mut values).await, Some(Some(Value::from(3))));
}

#[tokio::test]
async fn test_select_flatten_emits_plain_json() {
    let store = Fixture::new(json!({"user": {"name": "ann", "tags": ["x"]}}));
    let mut values = store.select_flatten("user");

    assert_eq!(
        next_item(&mut values).await,
        Some(Some(json!({"name": "ann", "tags": ["x"]})))
    );

    store.list_push("user.tags", vec![Value::from("y")]).unwrap();
    assert_eq!(
        next_item(&mut values).await,
        Some(Some(json!({"name": "ann", "tags": ["x", "y"]})))
    );
}

#[tokio::test]
async fn test_select_flatten_with_settings() {
    let store = Fixture::new(json!({"count": 3}));
    let settings = SelectSettings::<Option<serde_json::Value>>::new()
        .map(|item: Option<serde_json::Value>, _: &Store| item.and_then(|v| v.as_u64()).unwrap_or(0));
    let mut values = store.select_flatten_with("count", settings);

    assert_eq!(next_item(&mut values).await, Some(3));
}

#[tokio::test]
async fn test_on_filters_by_type() {
    let store = Fixture::new(json!({}));
    let mut pings = store.on("ping");
    let mut all = store.on("*");

    store.dispatch(Action::custom("pong", Value::Null)).unwrap();
    store.dispatch(Action::custom("ping", 1)).unwrap();

    let ping = next_item(&mut pings).await.unwrap();
    assert_eq!(ping.type_name(), "ping");
    assert_eq!(ping.payload(), Value::from(1));

    assert_eq!(next_item(&mut all).await.unwrap().type_name(), "pong");
    assert_eq!(next_item(&mut all).await.unwrap().type_name(), "ping");
}

#[tokio::test]
async fn test_source_emits_every_snapshot() {
    let store = Fixture::new(json!({"a": 1}));
    let mut states = store.source();

    assert_eq!(next_item(&mut states).await, Some(value(json!({"a": 1}))));
    store.set_in("a", 1).unwrap();
    store.set_in("a", 2).unwrap();

    // An unchanged pass still publishes its snapshot.
    assert_eq!(next_item(&mut states).await, Some(value(json!({"a": 1}))));
    assert_eq!(next_item(&mut states).await, Some(value(json!({"a": 2}))));
}

#[tokio::test]
async fn test_streams_end_when_store_completes() {
    let store = Fixture::new(json!({"a": 1}));
    let values = store.select("a");
    let actions = store.actions();

    store.set_in("a", 2).unwrap();
    store.complete();

    assert_eq!(
        values.collect::<Vec<_>>().await,
        vec![Some(Value::from(1)), Some(Value::from(2))]
    );
    let types: Vec<String> = actions
        .map(|action| action.type_name().to_string())
        .collect()
        .await;
    assert_eq!(types, vec!["@@set-in"]);
}
