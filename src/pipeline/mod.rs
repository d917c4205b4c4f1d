//! The two reducer chains every action goes through.
//!
//! Pre-processors rewrite the action, processors turn the (rewritten) action
//! into the next tree snapshot. Both chains run in registration order and
//! either may stop the fold early with [`Flow::Stop`].

mod builtins;
mod reducer;
mod registry;

pub(crate) use builtins::BuiltinProcessor;
pub(crate) use reducer::{reduce_action, reduce_data};
pub use registry::{Handle, HandlerCounts, HandlerId};
pub(crate) use registry::Registry;

use crate::action::Action;
use crate::error::StoreError;
use crate::tree::Value;

/// Result of a single reducer step.
#[derive(Debug, Clone)]
pub enum Flow<T> {
    /// Hand the value to the next matching reducer.
    Continue(T),
    /// Use the value as the chain's result and skip the remaining reducers.
    Stop(T),
}

impl<T> Flow<T> {
    pub fn into_inner(self) -> T {
        match self {
            Flow::Continue(value) | Flow::Stop(value) => value,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Flow::Stop(_))
    }
}

/// Anything a reducer may return.
///
/// A bare value continues the chain; errors abort the pass.
pub trait IntoFlow<T> {
    fn into_flow(self) -> Result<Flow<T>, StoreError>;
}

impl<T> IntoFlow<T> for Flow<T> {
    fn into_flow(self) -> Result<Flow<T>, StoreError> {
        Ok(self)
    }
}

impl<T> IntoFlow<T> for Result<Flow<T>, StoreError> {
    fn into_flow(self) -> Result<Flow<T>, StoreError> {
        self
    }
}

impl IntoFlow<Action> for Action {
    fn into_flow(self) -> Result<Flow<Action>, StoreError> {
        Ok(Flow::Continue(self))
    }
}

impl IntoFlow<Action> for Result<Action, StoreError> {
    fn into_flow(self) -> Result<Flow<Action>, StoreError> {
        self.map(Flow::Continue)
    }
}

impl IntoFlow<Value> for Value {
    fn into_flow(self) -> Result<Flow<Value>, StoreError> {
        Ok(Flow::Continue(self))
    }
}

impl IntoFlow<Value> for Result<Value, StoreError> {
    fn into_flow(self) -> Result<Flow<Value>, StoreError> {
        self.map(Flow::Continue)
    }
}

/// Action transform: `(state, action) -> action`.
///
/// Must be pure; the state it receives is the snapshot the pass started with.
pub trait PreProcessor: Send + Sync {
    fn process(&self, state: &Value, action: Action) -> Result<Flow<Action>, StoreError>;
}

impl<F, R> PreProcessor for F
where
    F: Fn(&Value, Action) -> R + Send + Sync,
    R: IntoFlow<Action>,
{
    fn process(&self, state: &Value, action: Action) -> Result<Flow<Action>, StoreError> {
        self(state, action).into_flow()
    }
}

/// State transform: `(state, action) -> state`.
///
/// Receives the state produced by the previous matching processor.
pub trait Processor: Send + Sync {
    fn process(&self, state: &Value, action: &Action) -> Result<Flow<Value>, StoreError>;
}

impl<F, R> Processor for F
where
    F: Fn(&Value, &Action) -> R + Send + Sync,
    R: IntoFlow<Value>,
{
    fn process(&self, state: &Value, action: &Action) -> Result<Flow<Value>, StoreError> {
        self(state, action).into_flow()
    }
}
