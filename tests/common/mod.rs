//! Shared test utilities.

#![allow(dead_code, unused_imports)]

use std::ops::Deref;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::{Mutex, MutexGuard};
use treestore::{Store, StoreConfig, Value};

/// Only one store may be live per process, so store tests take turns.
static SERIAL: Mutex<()> = parking_lot::const_mutex(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

/// A store that is completed when the test ends, freeing the slot for the
/// next test even if the test panicked.
pub struct Fixture {
    pub store: Store,
    _serial: MutexGuard<'static, ()>,
}

impl Fixture {
    pub fn new(initial: serde_json::Value) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    pub fn with_config(initial: serde_json::Value, config: StoreConfig) -> Self {
        let serial = serial();
        let store = Store::with_config(Value::from(initial), config).expect("Failed to create store");
        Self {
            store,
            _serial: serial,
        }
    }
}

impl Deref for Fixture {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.store.complete();
    }
}

pub fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// Next stream item, or `None` if nothing arrives within two seconds.
pub async fn next_item<T>(stream: &mut BoxStream<'static, T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .ok()
        .flatten()
}

/// Poll `store` until `check` holds for the current snapshot.
pub async fn wait_for<F>(store: &Store, check: F)
where
    F: Fn(&Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check(&store.peek()) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out waiting for state, last: {}",
            store.peek()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
