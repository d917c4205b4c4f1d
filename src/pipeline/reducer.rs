//! Folding an action through the captured chains.

use super::registry::Chain;
use super::{Flow, PreProcessor, Processor};
use crate::action::Action;
use crate::error::StoreError;
use crate::tree::Value;

/// Run the pre-processor chain.
///
/// Matching is re-evaluated against the current action at every step, so a
/// rewrite to another type is picked up by later reducers of that type.
/// `Flow::Stop` means the processor chain must not run.
pub(crate) fn reduce_action(
    state: &Value,
    action: Action,
    chain: &Chain<dyn PreProcessor>,
) -> Result<Flow<Action>, StoreError> {
    let mut current = action;
    for (filter, reducer) in chain {
        if !filter.matches(current.type_name()) {
            continue;
        }
        tracing::trace!(filter = %filter, action = current.type_name(), "Pre-processor matched");
        match reducer.process(state, current)? {
            Flow::Continue(next) => current = next,
            Flow::Stop(next) => return Ok(Flow::Stop(next)),
        }
    }
    Ok(Flow::Continue(current))
}

/// Run the processor chain and return the next snapshot.
pub(crate) fn reduce_data(
    state: &Value,
    action: &Action,
    chain: &Chain<dyn Processor>,
) -> Result<Value, StoreError> {
    let mut current = state.clone();
    for (filter, reducer) in chain {
        if !filter.matches(action.type_name()) {
            continue;
        }
        tracing::trace!(filter = %filter, action = action.type_name(), "Processor matched");
        match reducer.process(&current, action)? {
            Flow::Continue(next) => current = next,
            Flow::Stop(next) => return Ok(next),
        }
    }
    Ok(current)
}
