//! Scope proxies: a store view rooted at a sub-path.
//!
//! Reads and writes are relative to the base path. Handlers registered
//! through a scope are tracked, and [`ScopedStore::complete`] removes them,
//! ends the scope's streams and completes nested scopes, leaving the store
//! and sibling scopes untouched.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;

use crate::action::{Action, TypeFilter};
use crate::error::StoreError;
use crate::lifecycle::CompletionSignal;
use crate::orchestrator::{AsyncHandle, AsyncSource};
use crate::path::Path;
use crate::pipeline::{Handle, IntoFlow};
use crate::store::Store;
use crate::tree::Value;

/// View of the store rooted at a base path. Clones share one lifecycle.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<ScopeInner>,
}

impl fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore")
            .field("base", &self.inner.base)
            .field("completed", &self.is_completed())
            .finish()
    }
}

struct ScopeInner {
    store: Store,
    base: Path,
    handlers: Mutex<Vec<Handle>>,
    children: Mutex<Vec<ScopedStore>>,
    completion: CompletionSignal,
}

impl ScopedStore {
    pub(crate) fn new(store: Store, base: Path) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                store,
                base,
                handlers: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
                completion: CompletionSignal::new(),
            }),
        }
    }

    /// Base path as given, relative tokens included.
    pub fn base(&self) -> &Path {
        &self.inner.base
    }

    fn path(&self, relative: impl Into<Path>) -> Path {
        self.inner.base.join(&relative.into())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.inner.completion.is_completed() {
            return Err(StoreError::ScopeCompleted);
        }
        Ok(())
    }

    fn until_complete<T: Send + 'static>(&self, stream: BoxStream<'static, T>) -> BoxStream<'static, T> {
        let completion = self.inner.completion.handle();
        stream
            .take_until(async move { completion.wait().await })
            .boxed()
    }

    fn track(&self, handle: Handle) -> Handle {
        let mut handlers = self.inner.handlers.lock();
        handlers.retain(Handle::is_registered);
        handlers.push(handle.clone());
        handle
    }

    /// Nothing but the parent's list reaches this scope, and completing it
    /// would change nothing: no live handlers, streams or children.
    fn is_disposable(&self) -> bool {
        if Arc::strong_count(&self.inner) > 1 || self.inner.completion.has_observers() {
            return false;
        }
        if self.inner.handlers.lock().iter().any(Handle::is_registered) {
            return false;
        }
        let mut children = self.inner.children.lock();
        children.retain(|child| !child.is_completed() && !child.is_disposable());
        children.is_empty()
    }

    /// Value under the base path, re-emitted on change.
    pub fn source(&self) -> BoxStream<'static, Option<Value>> {
        self.until_complete(self.inner.store.select(self.inner.base.clone()))
    }

    /// Actions whose resolved path lies under the resolved base path.
    ///
    /// Actions without a path (such as a store-wide `@@set`) are not
    /// included.
    pub fn actions(&self) -> BoxStream<'static, Action> {
        let base = self.inner.base.resolve();
        let actions = self
            .inner
            .store
            .actions()
            .filter(move |action| {
                future::ready(action.path().is_some_and(|path| path.resolve().starts_with(&base)))
            })
            .boxed();
        self.until_complete(actions)
    }

    pub fn on(&self, filter: impl Into<TypeFilter>) -> BoxStream<'static, Action> {
        let filter = filter.into();
        self.actions()
            .filter(move |action| future::ready(filter.matches(action.type_name())))
            .boxed()
    }

    pub fn peek(&self) -> Option<Value> {
        self.inner.store.peek_key(self.inner.base.clone())
    }

    pub fn peek_key(&self, path: impl Into<Path>) -> Option<Value> {
        self.inner.store.peek_key(self.path(path))
    }

    pub fn select(&self, path: impl Into<Path>) -> BoxStream<'static, Option<Value>> {
        self.until_complete(self.inner.store.select(self.path(path)))
    }

    pub fn select_map<T, F>(&self, path: impl Into<Path>, mapping: F) -> BoxStream<'static, T>
    where
        T: Send + 'static,
        F: Fn(Option<Value>) -> T + Send + 'static,
    {
        self.select(path).map(mapping).boxed()
    }

    /// Dispatch with the action's path re-rooted under the base.
    pub fn dispatch(&self, action: Action) -> Result<&Self, StoreError> {
        self.ensure_open()?;
        self.inner.store.dispatch(action.with_base(&self.inner.base))?;
        Ok(self)
    }

    pub fn dispatch_type(&self, action_type: &str, payload: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::from_parts(action_type, payload.into())?)
    }

    /// Replace the value at the base path.
    pub fn set(&self, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::set(value))
    }

    pub fn set_in(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::set_in(path, value))
    }

    pub fn patch(&self, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::patch(Path::root(), value))
    }

    pub fn patch_in(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::patch(path, value))
    }

    pub fn apply<F>(&self, operation: F) -> Result<&Self, StoreError>
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.dispatch(Action::apply(Path::root(), operation))
    }

    pub fn apply_in<F>(&self, path: impl Into<Path>, operation: F) -> Result<&Self, StoreError>
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.dispatch(Action::apply(path, operation))
    }

    pub fn delete(&self, key: impl Into<String>) -> Result<&Self, StoreError> {
        self.dispatch(Action::delete(Path::root(), key))
    }

    pub fn delete_in(&self, path: impl Into<Path>, key: impl Into<String>) -> Result<&Self, StoreError> {
        self.dispatch(Action::delete(path, key))
    }

    pub fn list_push(&self, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.list_push_in(Path::root(), items)
    }

    pub fn list_push_in(&self, path: impl Into<Path>, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_push(path, items))
    }

    pub fn list_pop(&self) -> Result<&Self, StoreError> {
        self.list_pop_in(Path::root())
    }

    pub fn list_pop_in(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_pop(path))
    }

    pub fn list_shift(&self) -> Result<&Self, StoreError> {
        self.list_shift_in(Path::root())
    }

    pub fn list_shift_in(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_shift(path))
    }

    pub fn list_unshift(&self, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.list_unshift_in(Path::root(), items)
    }

    pub fn list_unshift_in(&self, path: impl Into<Path>, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_unshift(path, items))
    }

    pub fn list_splice(&self, index: i64, delete_count: usize, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.list_splice_in(Path::root(), index, delete_count, items)
    }

    pub fn list_splice_in(
        &self,
        path: impl Into<Path>,
        index: i64,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_splice(path, index, delete_count, items))
    }

    pub fn list_sort(&self) -> Result<&Self, StoreError> {
        self.list_sort_in(Path::root())
    }

    pub fn list_sort_in(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_sort(path))
    }

    pub fn list_sort_by<F>(&self, compare: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.list_sort_by_in(Path::root(), compare)
    }

    pub fn list_sort_by_in<F>(&self, path: impl Into<Path>, compare: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.dispatch(Action::list_sort_by(path, compare))
    }

    pub fn list_filter<F>(&self, predicate: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, usize, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.list_filter_in(Path::root(), predicate)
    }

    pub fn list_filter_in<F>(&self, path: impl Into<Path>, predicate: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, usize, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.dispatch(Action::list_filter(path, predicate))
    }

    pub fn register_pre_processor<F, R>(
        &self,
        filter: impl Into<TypeFilter>,
        reducer: F,
    ) -> Result<Handle, StoreError>
    where
        F: Fn(&Value, Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Action>,
    {
        self.ensure_open()?;
        Ok(self.track(self.inner.store.register_pre_processor(filter, reducer)))
    }

    pub fn register_global_pre_processor<F, R>(&self, reducer: F) -> Result<Handle, StoreError>
    where
        F: Fn(&Value, Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Action>,
    {
        self.register_pre_processor(TypeFilter::Any, reducer)
    }

    pub fn register_processor<F, R>(&self, filter: impl Into<TypeFilter>, reducer: F) -> Result<Handle, StoreError>
    where
        F: Fn(&Value, &Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Value>,
    {
        self.ensure_open()?;
        Ok(self.track(self.inner.store.register_processor(filter, reducer)))
    }

    pub fn register_global_processor<F, R>(&self, reducer: F) -> Result<Handle, StoreError>
    where
        F: Fn(&Value, &Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Value>,
    {
        self.register_processor(TypeFilter::Any, reducer)
    }

    pub fn register_async<F>(&self, action_type: impl Into<String>, handler: F) -> Result<AsyncHandle, StoreError>
    where
        F: Fn(&Value, &Action) -> AsyncSource + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let handle = self.inner.store.register_async(action_type, handler)?;
        self.track(handle.handle().clone());
        Ok(handle)
    }

    /// Nested scope at `base ++ path`, completed together with this one.
    pub fn sub_handler(&self, path: impl Into<Path>) -> Result<ScopedStore, StoreError> {
        self.ensure_open()?;
        let child = ScopedStore::new(self.inner.store.clone(), self.path(path));
        let mut children = self.inner.children.lock();
        children.retain(|child| !child.is_completed() && !child.is_disposable());
        children.push(child.clone());
        Ok(child)
    }

    /// Remove every handler registered through this scope, end its streams
    /// and complete nested scopes. Idempotent.
    pub fn complete(&self) {
        if !self.inner.completion.complete() {
            return;
        }
        let handlers = std::mem::take(&mut *self.inner.handlers.lock());
        for handle in &handlers {
            handle.remove();
        }
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in &children {
            child.complete();
        }
        tracing::debug!(
            base = %self.inner.base,
            handlers = handlers.len(),
            children = children.len(),
            "Scope completed"
        );
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completion.is_completed()
    }
}
