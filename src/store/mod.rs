//! The store: one tree, one writer, many observers.
//!
//! All writes go through [`Store::dispatch`]. Each dispatched action runs a
//! full pass (pre-processors, then processors) under the pipeline lock and
//! publishes the resulting snapshot. A dispatch issued while a pass is
//! running on the same thread is queued and drained by the outer call
//! before it returns.

mod verbs;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::action::{Action, Lifecycle, TypeFilter, Verb};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::instance::InstanceGuard;
use crate::lifecycle::CompletionSignal;
use crate::notifier::{spawn_listener, PostAction, PostActionListener, PostActionNotifier, Subscription};
use crate::orchestrator::{relay, AsyncHandle, AsyncProcessor, AsyncSource};
use crate::path::Path;
use crate::pipeline::{
    reduce_action, reduce_data, BuiltinProcessor, Flow, Handle, HandlerCounts, HandlerId, IntoFlow,
    Registry,
};
use crate::scope::ScopedStore;
use crate::stream::{from_broadcast, from_fanout, Fanout};
use crate::tree::Value;

/// Handle to the store. Clones share the same tree and pipeline.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning reference to a [`Store`], held by background tasks and
/// streams so they never keep the store alive.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

struct StoreInner {
    config: StoreConfig,
    state: RwLock<Value>,
    registry: Arc<Mutex<Registry>>,
    pipeline: ReentrantMutex<RefCell<DispatchQueue>>,
    actions: Fanout<Action>,
    states: broadcast::Sender<Value>,
    notifier: PostActionNotifier,
    completion: CompletionSignal,
    slot: InstanceGuard,
}

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<Action>,
    draining: bool,
    /// Records of finished passes, handed out when the drain ends.
    finished: Vec<PostAction>,
}

impl Store {
    /// Create the store with default settings.
    ///
    /// A `Null` initial value starts from an empty map.
    ///
    /// # Errors
    /// Returns [`StoreError::SingleInstance`] while another store is live.
    pub fn new(initial: impl Into<Value>) -> Result<Self, StoreError> {
        Self::with_config(initial, StoreConfig::default())
    }

    pub fn with_config(initial: impl Into<Value>, config: StoreConfig) -> Result<Self, StoreError> {
        let slot = InstanceGuard::acquire()?;

        let initial = match initial.into() {
            Value::Null => Value::map(),
            value => value,
        };
        let capacity = config.channel_capacity.max(1);
        let (states, _) = broadcast::channel(capacity);

        let mut registry = Registry::default();
        for verb in Verb::ALL {
            registry.add_processor(TypeFilter::from(verb), Arc::new(BuiltinProcessor(verb)));
        }

        tracing::debug!(capacity, "Store created");

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                state: RwLock::new(initial),
                registry: Arc::new(Mutex::new(registry)),
                pipeline: ReentrantMutex::new(RefCell::new(DispatchQueue::default())),
                actions: Fanout::new(),
                states,
                notifier: PostActionNotifier::new(),
                completion: CompletionSignal::new(),
                slot,
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `action` through the pipeline.
    ///
    /// Returns once the action and everything it enqueued has been
    /// processed, or with the first error raised by a reducer. Actions
    /// queued behind a failed pass are discarded.
    pub fn dispatch(&self, action: Action) -> Result<&Self, StoreError> {
        if self.inner.completion.is_completed() {
            return Err(StoreError::Completed);
        }

        let pipeline = self.inner.pipeline.lock();
        {
            let mut queue = pipeline.borrow_mut();
            queue.pending.push_back(action);
            if queue.draining {
                return Ok(self);
            }
            queue.draining = true;
        }

        // Also runs when a reducer panics: the queue must not carry this
        // drain's leftovers into the next dispatch.
        let drain = scopeguard::guard((), |()| {
            let mut queue = pipeline.borrow_mut();
            queue.draining = false;
            if !queue.pending.is_empty() {
                tracing::warn!(
                    discarded = queue.pending.len(),
                    "Discarding queued actions after a failed pass"
                );
                queue.pending.clear();
            }
            if !queue.finished.is_empty() {
                tracing::warn!(
                    discarded = queue.finished.len(),
                    "Discarding post-action records of an interrupted drain"
                );
                queue.finished.clear();
            }
        });

        let result = loop {
            let next = pipeline.borrow_mut().pending.pop_front();
            let Some(action) = next else {
                break Ok(());
            };
            if let Err(err) = self.run_pass(action) {
                break Err(err);
            }
        };
        let finished = std::mem::take(&mut pipeline.borrow_mut().finished);
        drop(drain);
        drop(pipeline);
        for record in finished {
            self.inner.notifier.publish(record);
        }

        result.map(|()| self)
    }

    /// Dispatch an action given as type name and payload.
    ///
    /// Built-in type names are read as their verb; anything else becomes a
    /// custom action.
    pub fn dispatch_type(&self, action_type: &str, payload: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::from_parts(action_type, payload.into())?)
    }

    fn run_pass(&self, action: Action) -> Result<(), StoreError> {
        let initial = self.inner.state.read().clone();

        let intercept = {
            let registry = self.inner.registry.lock();
            registry
                .find_async(action.type_name())
                .map(|entry| (entry.id, Arc::clone(&entry.handler), entry.paused))
        };

        let (next, executed) = match intercept {
            Some((id, handler, paused)) => {
                if paused {
                    tracing::debug!(handler = %id, action = action.type_name(), "Async processor paused, dispatch swallowed");
                    self.inner.actions.send(action.clone());
                } else {
                    let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
                    self.inner.actions.send(action.clone());
                    self.launch(&runtime, handler, &initial, &action)?;
                }
                (initial.clone(), None)
            }
            None => {
                self.inner.actions.send(action.clone());
                let (pre, processors) = {
                    let registry = self.inner.registry.lock();
                    (registry.active_pre(), registry.active_processors())
                };
                match reduce_action(&initial, action.clone(), &pre)? {
                    Flow::Stop(executed) => (initial.clone(), Some(executed)),
                    Flow::Continue(executed) => {
                        let next = reduce_data(&initial, &executed, &processors)?;
                        (next, Some(executed))
                    }
                }
            }
        };

        let changed = !next.same(&initial);
        *self.inner.state.write() = next.clone();
        let _ = self.inner.states.send(next.clone());
        tracing::debug!(action = action.type_name(), changed, "Pass complete");

        self.inner.pipeline.lock().borrow_mut().finished.push(PostAction {
            initial_state: initial,
            final_state: next,
            initial_action: action,
            executed_action: executed,
        });
        Ok(())
    }

    /// Start one async run: call the handler, queue `::START` and relay the
    /// first emission of the source back into the pipeline.
    fn launch(
        &self,
        runtime: &tokio::runtime::Handle,
        handler: Arc<dyn AsyncProcessor>,
        state: &Value,
        action: &Action,
    ) -> Result<(), StoreError> {
        let source: AsyncSource = handler.start(state, action);
        let action_type = action.type_name().to_string();
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, action = %action_type, "Async run started");

        self.dispatch(Action::custom(Lifecycle::Start.type_for(&action_type), action.payload()))?;

        let span = tracing::info_span!("async_run", %run_id, action = %action_type);
        runtime.spawn(relay(self.downgrade(), action_type, source).instrument(span));
        Ok(())
    }

    /// Current snapshot.
    pub fn peek(&self) -> Value {
        self.inner.state.read().clone()
    }

    /// Value at the resolved `path` of the current snapshot.
    pub fn peek_key(&self, path: impl Into<Path>) -> Option<Value> {
        self.inner.state.read().get_in(&path.into().resolve()).cloned()
    }

    /// Every snapshot, starting with the current one.
    pub fn source(&self) -> BoxStream<'static, Value> {
        // Subscribe and read under the pipeline lock so no pass slips in
        // between the two.
        let (receiver, current) = {
            let _pipeline = self.inner.pipeline.lock();
            (self.inner.states.subscribe(), self.peek())
        };
        stream::once(future::ready(current))
            .chain(from_broadcast(receiver, self.inner.completion.handle(), "states"))
            .boxed()
    }

    /// Every dispatched action, before pre-processing.
    ///
    /// Lossless: a slow consumer buffers instead of skipping.
    pub fn actions(&self) -> BoxStream<'static, Action> {
        from_fanout(self.inner.actions.subscribe(), self.inner.completion.handle())
    }

    /// Dispatched actions of one type (`"*"` for all).
    pub fn on(&self, filter: impl Into<TypeFilter>) -> BoxStream<'static, Action> {
        let filter = filter.into();
        self.actions()
            .filter(move |action| future::ready(filter.matches(action.type_name())))
            .boxed()
    }

    /// Post-action records, one per pass.
    pub fn post_actions(&self) -> BoxStream<'static, PostAction> {
        from_fanout(self.inner.notifier.subscribe(), self.inner.completion.handle())
    }

    /// Run `listener` for every post-action record on a background task.
    ///
    /// # Errors
    /// Returns [`StoreError::NoRuntime`] outside of a tokio runtime.
    pub fn listen_post_actions<L>(&self, listener: L) -> Result<Subscription, StoreError>
    where
        L: PostActionListener,
    {
        tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        Ok(spawn_listener(
            self.inner.notifier.subscribe(),
            self.inner.completion.handle(),
            listener,
        ))
    }

    /// Register an action transform for one type (`"*"` for all).
    pub fn register_pre_processor<F, R>(&self, filter: impl Into<TypeFilter>, reducer: F) -> Handle
    where
        F: Fn(&Value, Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Action>,
    {
        let filter = filter.into();
        let id = self.inner.registry.lock().add_pre(filter.clone(), Arc::new(reducer));
        tracing::debug!(handler = %id, filter = %filter, "Pre-processor registered");
        Handle::new(&self.inner.registry, id)
    }

    pub fn register_global_pre_processor<F, R>(&self, reducer: F) -> Handle
    where
        F: Fn(&Value, Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Action>,
    {
        self.register_pre_processor(TypeFilter::Any, reducer)
    }

    /// Register a state transform for one type (`"*"` for all).
    pub fn register_processor<F, R>(&self, filter: impl Into<TypeFilter>, reducer: F) -> Handle
    where
        F: Fn(&Value, &Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Value>,
    {
        let filter = filter.into();
        let id = self.inner.registry.lock().add_processor(filter.clone(), Arc::new(reducer));
        tracing::debug!(handler = %id, filter = %filter, "Processor registered");
        Handle::new(&self.inner.registry, id)
    }

    pub fn register_global_processor<F, R>(&self, reducer: F) -> Handle
    where
        F: Fn(&Value, &Action) -> R + Send + Sync + 'static,
        R: IntoFlow<Value>,
    {
        self.register_processor(TypeFilter::Any, reducer)
    }

    /// Route dispatches of `action_type` to an async handler.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] when the type already has one.
    pub fn register_async<F>(&self, action_type: impl Into<String>, handler: F) -> Result<AsyncHandle, StoreError>
    where
        F: Fn(&Value, &Action) -> AsyncSource + Send + Sync + 'static,
    {
        let action_type = action_type.into();
        let id = self.inner.registry.lock().add_async(&action_type, Arc::new(handler))?;
        tracing::debug!(handler = %id, action = %action_type, "Async processor registered");
        Ok(AsyncHandle::new(
            Handle::new(&self.inner.registry, id),
            self.downgrade(),
            action_type,
        ))
    }

    /// Record a lifecycle pre-processor as owned by an async entry.
    pub(crate) fn attach_lifecycle(&self, owner: HandlerId, pre: &Handle) {
        self.inner.registry.lock().attach_lifecycle(owner, pre.id());
    }

    pub fn handler_counts(&self) -> HandlerCounts {
        self.inner.registry.lock().counts()
    }

    /// A proxy rooted at `path`.
    pub fn sub_handler(&self, path: impl Into<Path>) -> ScopedStore {
        ScopedStore::new(self.clone(), path.into())
    }

    /// Stop accepting actions, end every stream and free the
    /// single-instance slot. Idempotent.
    pub fn complete(&self) {
        if !self.inner.completion.complete() {
            return;
        }
        self.inner.slot.release();
        tracing::info!("Store completed");
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completion.is_completed()
    }
}
