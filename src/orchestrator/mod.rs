//! Async action lifecycles.
//!
//! A type registered with [`Store::register_async`](crate::Store::register_async)
//! no longer reaches the reducers. Its dispatch calls the handler, queues
//! `TYPE::START` and relays the first emission of the returned source as
//! `TYPE::NEXT` + `TYPE::COMPLETE`, a failure as `TYPE::ERROR`, or an empty
//! source as `TYPE::COMPLETE`. Those lifecycle actions are ordinary
//! dispatches and go through the whole pipeline.

pub mod source;

use std::fmt;

use futures::stream::BoxStream;
use futures::StreamExt;
use futures_core::Stream;

use crate::action::{Action, Lifecycle};
use crate::error::StoreError;
use crate::notifier::Subscription;
use crate::pipeline::Handle;
use crate::store::WeakStore;
use crate::tree::Value;

/// What an async handler returns. Only the first item is used.
pub type AsyncSource = BoxStream<'static, anyhow::Result<Value>>;

/// Starts one async run for a dispatched action.
pub trait AsyncProcessor: Send + Sync {
    fn start(&self, state: &Value, action: &Action) -> AsyncSource;
}

impl<F> AsyncProcessor for F
where
    F: Fn(&Value, &Action) -> AsyncSource + Send + Sync,
{
    fn start(&self, state: &Value, action: &Action) -> AsyncSource {
        self(state, action)
    }
}

/// Relay the first item of `source` as lifecycle actions.
pub(crate) async fn relay(store: WeakStore, action_type: String, mut source: AsyncSource) {
    let first = source.next().await;
    drop(source);

    let Some(store) = store.upgrade() else {
        tracing::debug!(action = %action_type, "Store dropped before the async run finished");
        return;
    };

    let outcome = match first {
        Some(Ok(value)) => store
            .dispatch_type(&Lifecycle::Next.type_for(&action_type), value)
            .and_then(|store| store.dispatch_type(&Lifecycle::Complete.type_for(&action_type), Value::Null)),
        Some(Err(error)) => {
            tracing::debug!(action = %action_type, error = %error, "Async source failed");
            store.dispatch_type(
                &Lifecycle::Error.type_for(&action_type),
                Value::from(format!("{error:#}")),
            )
        }
        None => store.dispatch_type(&Lifecycle::Complete.type_for(&action_type), Value::Null),
    };

    match outcome {
        Ok(_) => tracing::debug!(action = %action_type, "Async run finished"),
        Err(StoreError::Completed) => {
            tracing::debug!(action = %action_type, "Store completed before the async run finished")
        }
        Err(error) => {
            tracing::error!(action = %action_type, error = %error, "Failed to dispatch lifecycle action")
        }
    }
}

/// Registration of an async processor.
///
/// Besides pause/resume/remove it installs lifecycle callbacks. Those are
/// pre-processors on the suffixed types that turn the lifecycle action into
/// a regular one; removing the async handle removes them too.
#[derive(Clone)]
pub struct AsyncHandle {
    handle: Handle,
    store: WeakStore,
    action_type: String,
}

impl fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("action_type", &self.action_type)
            .field("handle", &self.handle)
            .finish()
    }
}

impl AsyncHandle {
    pub(crate) fn new(handle: Handle, store: WeakStore, action_type: String) -> Self {
        Self {
            handle,
            store,
            action_type,
        }
    }

    /// The registered action type.
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn pause(&self) -> &Self {
        self.handle.pause();
        self
    }

    pub fn resume(&self) -> &Self {
        self.handle.resume();
        self
    }

    pub fn remove(&self) {
        self.handle.remove();
    }

    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }

    pub fn is_registered(&self) -> bool {
        self.handle.is_registered()
    }

    fn on_lifecycle<F>(&self, stage: Lifecycle, callback: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value) -> Action + Send + Sync + 'static,
    {
        let store = self.store.upgrade().ok_or(StoreError::Completed)?;
        if !self.handle.is_registered() {
            return Err(StoreError::InvalidPayload {
                action_type: self.action_type.clone(),
                reason: "async processor has been removed".to_string(),
            });
        }
        let pre = store.register_pre_processor(stage.type_for(&self.action_type), move |_: &Value, action: Action| {
            callback(&action.payload())
        });
        store.attach_lifecycle(self.handle.id(), &pre);
        Ok(self)
    }

    /// Rewrite `TYPE::START` into the action built by `callback`.
    pub fn on_start<F>(&self, callback: F) -> Result<&Self, StoreError>
    where
        F: Fn() -> Action + Send + Sync + 'static,
    {
        self.on_lifecycle(Lifecycle::Start, move |_| callback())
    }

    /// Rewrite `TYPE::NEXT`; the callback receives the emitted value.
    pub fn on_next<F>(&self, callback: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value) -> Action + Send + Sync + 'static,
    {
        self.on_lifecycle(Lifecycle::Next, callback)
    }

    /// Rewrite `TYPE::ERROR`; the callback receives the error message.
    pub fn on_error<F>(&self, callback: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value) -> Action + Send + Sync + 'static,
    {
        self.on_lifecycle(Lifecycle::Error, callback)
    }

    pub fn on_complete<F>(&self, callback: F) -> Result<&Self, StoreError>
    where
        F: Fn() -> Action + Send + Sync + 'static,
    {
        self.on_lifecycle(Lifecycle::Complete, move |_| callback())
    }

    /// Dispatch the registered type once per item of `values`.
    ///
    /// # Errors
    /// Returns [`StoreError::NoRuntime`] outside of a tokio runtime.
    pub fn trigger<S>(&self, values: S) -> Result<Subscription, StoreError>
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let store = self.store.clone();
        let action_type = self.action_type.clone();
        let task = runtime.spawn(async move {
            let mut values = Box::pin(values);
            while let Some(value) = values.next().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(error) = store.dispatch(Action::custom(action_type.clone(), value)) {
                    tracing::warn!(action = %action_type, error = %error, "Trigger stopped");
                    break;
                }
            }
        });
        Ok(Subscription::new(task))
    }
}
