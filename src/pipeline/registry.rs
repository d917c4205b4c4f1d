//! Handler registry.
//!
//! Entries live in ordered vectors owned by the store; callers only hold a
//! [`Handle`] (an id plus a weak pointer back to the registry), so dropping
//! the store never leaks through outstanding handles.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{PreProcessor, Processor};
use crate::action::TypeFilter;
use crate::error::StoreError;
use crate::orchestrator::AsyncProcessor;

/// Stable identifier of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Number of live registrations per chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerCounts {
    pub pre_processors: usize,
    pub processors: usize,
    pub async_processors: usize,
}

pub(crate) struct Entry<R: ?Sized> {
    id: HandlerId,
    filter: TypeFilter,
    reducer: Arc<R>,
    paused: bool,
}

pub(crate) struct AsyncEntry {
    pub(crate) id: HandlerId,
    pub(crate) for_type: String,
    pub(crate) handler: Arc<dyn AsyncProcessor>,
    pub(crate) paused: bool,
    /// Pre-processors installed through the lifecycle callbacks.
    lifecycle: Vec<HandlerId>,
}

/// Active reducers of one chain, captured at the start of a pass.
pub(crate) type Chain<R> = Vec<(TypeFilter, Arc<R>)>;

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    pre: Vec<Entry<dyn PreProcessor>>,
    processors: Vec<Entry<dyn Processor>>,
    asyncs: Vec<AsyncEntry>,
}

impl Registry {
    fn allocate(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    pub(crate) fn add_pre(&mut self, filter: TypeFilter, reducer: Arc<dyn PreProcessor>) -> HandlerId {
        let id = self.allocate();
        self.pre.push(Entry {
            id,
            filter,
            reducer,
            paused: false,
        });
        id
    }

    pub(crate) fn add_processor(&mut self, filter: TypeFilter, reducer: Arc<dyn Processor>) -> HandlerId {
        let id = self.allocate();
        self.processors.push(Entry {
            id,
            filter,
            reducer,
            paused: false,
        });
        id
    }

    pub(crate) fn add_async(
        &mut self,
        for_type: &str,
        handler: Arc<dyn AsyncProcessor>,
    ) -> Result<HandlerId, StoreError> {
        if self.asyncs.iter().any(|entry| entry.for_type == for_type) {
            return Err(StoreError::Conflict {
                action_type: for_type.to_string(),
            });
        }
        let id = self.allocate();
        self.asyncs.push(AsyncEntry {
            id,
            for_type: for_type.to_string(),
            handler,
            paused: false,
            lifecycle: Vec::new(),
        });
        Ok(id)
    }

    /// Record `pre_id` as owned by the async entry `owner`.
    pub(crate) fn attach_lifecycle(&mut self, owner: HandlerId, pre_id: HandlerId) {
        if let Some(entry) = self.asyncs.iter_mut().find(|entry| entry.id == owner) {
            entry.lifecycle.push(pre_id);
        }
    }

    pub(crate) fn active_pre(&self) -> Chain<dyn PreProcessor> {
        self.pre
            .iter()
            .filter(|entry| !entry.paused)
            .map(|entry| (entry.filter.clone(), Arc::clone(&entry.reducer)))
            .collect()
    }

    pub(crate) fn active_processors(&self) -> Chain<dyn Processor> {
        self.processors
            .iter()
            .filter(|entry| !entry.paused)
            .map(|entry| (entry.filter.clone(), Arc::clone(&entry.reducer)))
            .collect()
    }

    pub(crate) fn find_async(&self, action_type: &str) -> Option<&AsyncEntry> {
        self.asyncs.iter().find(|entry| entry.for_type == action_type)
    }

    fn paused_flag(&mut self, id: HandlerId) -> Option<&mut bool> {
        if let Some(entry) = self.pre.iter_mut().find(|e| e.id == id) {
            return Some(&mut entry.paused);
        }
        if let Some(entry) = self.processors.iter_mut().find(|e| e.id == id) {
            return Some(&mut entry.paused);
        }
        self.asyncs
            .iter_mut()
            .find(|e| e.id == id)
            .map(|entry| &mut entry.paused)
    }

    pub(crate) fn set_paused(&mut self, id: HandlerId, paused: bool) {
        if let Some(flag) = self.paused_flag(id) {
            *flag = paused;
        }
    }

    pub(crate) fn is_paused(&self, id: HandlerId) -> Option<bool> {
        self.pre
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.paused)
            .or_else(|| self.processors.iter().find(|e| e.id == id).map(|e| e.paused))
            .or_else(|| self.asyncs.iter().find(|e| e.id == id).map(|e| e.paused))
    }

    /// Detach an entry. Async entries take their lifecycle pre-processors
    /// with them. Returns `false` when the id was already gone.
    pub(crate) fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.pre.len() + self.processors.len() + self.asyncs.len();
        self.pre.retain(|e| e.id != id);
        self.processors.retain(|e| e.id != id);
        if let Some(index) = self.asyncs.iter().position(|e| e.id == id) {
            let entry = self.asyncs.remove(index);
            self.pre.retain(|e| !entry.lifecycle.contains(&e.id));
        }
        before != self.pre.len() + self.processors.len() + self.asyncs.len()
    }

    pub(crate) fn counts(&self) -> HandlerCounts {
        HandlerCounts {
            pre_processors: self.pre.len(),
            processors: self.processors.len(),
            async_processors: self.asyncs.len(),
        }
    }
}

/// Capability to pause, resume or remove one registration.
///
/// Handles are cheap to clone; all clones address the same entry. Once the
/// store is gone every operation is a no-op.
#[derive(Clone)]
pub struct Handle {
    registry: Weak<Mutex<Registry>>,
    id: HandlerId,
}

impl Handle {
    pub(crate) fn new(registry: &Arc<Mutex<Registry>>, id: HandlerId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Skip this handler from the next pass on.
    pub fn pause(&self) -> &Self {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().set_paused(self.id, true);
            tracing::debug!(handler = %self.id, "Handler paused");
        }
        self
    }

    pub fn resume(&self) -> &Self {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().set_paused(self.id, false);
            tracing::debug!(handler = %self.id, "Handler resumed");
        }
        self
    }

    /// Detach the handler. Calling it again is harmless.
    pub fn remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.lock().remove(self.id) {
                tracing::debug!(handler = %self.id, "Handler removed");
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.registry
            .upgrade()
            .and_then(|registry| registry.lock().is_paused(self.id))
            .unwrap_or(false)
    }

    pub fn is_registered(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().is_paused(self.id).is_some())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.id).finish()
    }
}
