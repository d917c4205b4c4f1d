//! Process-wide single-instance rule and the application context that
//! hands the one store to its consumers.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, StoreConfig};
use crate::error::StoreError;
use crate::path::Path;
use crate::scope::ScopedStore;
use crate::store::Store;
use crate::tree::Value;

static LIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the process-wide store slot, released on `release()` or drop.
pub(crate) struct InstanceGuard {
    held: AtomicBool,
}

impl InstanceGuard {
    pub(crate) fn acquire() -> Result<Self, StoreError> {
        if LIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StoreError::SingleInstance);
        }
        Ok(Self {
            held: AtomicBool::new(true),
        })
    }

    pub(crate) fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            LIVE.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Explicit application context owning the store.
///
/// Consumers receive a `StoreContext` (or a clone of its store) instead of
/// looking the store up from a global.
#[derive(Clone)]
pub struct StoreContext {
    store: Store,
    config: Config,
}

impl StoreContext {
    /// Build the store described by `config.store`.
    pub fn new(config: Config, initial: impl Into<Value>) -> Result<Self, StoreError> {
        let store = Store::with_config(initial, config.store.clone())?;
        Ok(Self { store, config })
    }

    /// Wrap an existing store.
    pub fn from_store(store: Store) -> Self {
        let config = Config {
            store: store.config().clone(),
            ..Config::default()
        };
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_config(&self) -> &StoreConfig {
        &self.config.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A scope proxy rooted at `path`.
    pub fn scope(&self, path: impl Into<Path>) -> ScopedStore {
        self.store.sub_handler(path)
    }
}
