//! Processors for the built-in verbs.
//!
//! Installed once per verb when the store is built, ahead of any user
//! processor. Paths are resolved before they touch the tree.

use std::sync::Arc;

use super::{Flow, Processor};
use crate::action::{Action, Verb};
use crate::error::StoreError;
use crate::path::Path;
use crate::tree::Value;

pub(crate) struct BuiltinProcessor(pub(crate) Verb);

impl Processor for BuiltinProcessor {
    fn process(&self, state: &Value, action: &Action) -> Result<Flow<Value>, StoreError> {
        // A custom action may carry a verb's type name; read its payload as that verb.
        if let Action::Custom {
            action_type,
            payload,
        } = action
        {
            return match Action::from_parts(action_type, payload.clone())? {
                Action::Custom { .. } => Ok(Flow::Continue(state.clone())),
                typed => self.process(state, &typed),
            };
        }
        if action.verb() != Some(self.0) {
            return Ok(Flow::Continue(state.clone()));
        }
        execute(state, action).map(Flow::Continue)
    }
}

fn execute(state: &Value, action: &Action) -> Result<Value, StoreError> {
    match action {
        Action::Set { value } => Ok(value.clone()),
        Action::SetIn { path, value } => state.set_in(&path.resolve(), value.clone()),
        Action::Patch { path, value } => state.merge_deep_in(&path.resolve(), value),
        Action::Apply { path, operation } => {
            state.update_in(&path.resolve(), |current| Ok(operation(current)))
        }
        Action::Delete { path, key } => state.remove_key_in(&path.resolve(), key),
        Action::ListPush { path, items } => rewrite_list(state, path, |list| {
            list.extend(items.iter().cloned());
        }),
        Action::ListPop { path } => rewrite_list(state, path, |list| {
            list.pop();
        }),
        Action::ListShift { path } => rewrite_list(state, path, |list| {
            if !list.is_empty() {
                list.remove(0);
            }
        }),
        Action::ListUnshift { path, items } => rewrite_list(state, path, |list| {
            list.splice(0..0, items.iter().cloned());
        }),
        Action::ListSplice {
            path,
            index,
            delete_count,
            items,
        } => rewrite_list(state, path, |list| {
            let start = splice_start(*index, list.len());
            let end = start + (*delete_count).min(list.len() - start);
            list.splice(start..end, items.iter().cloned());
        }),
        Action::ListSort { path, compare } => rewrite_list(state, path, |list| match compare {
            Some(compare) => list.sort_by(|a, b| compare(a, b)),
            None => list.sort_by(Value::compare),
        }),
        Action::ListFilter { path, predicate } => {
            let resolved = path.resolve();
            let original = state.list_in(&resolved)?;
            let kept: Vec<Value> = original
                .iter()
                .enumerate()
                .filter(|(index, item)| predicate(item, *index, &original))
                .map(|(_, item)| item.clone())
                .collect();
            state.set_in(&resolved, Value::from(kept))
        }
        Action::Custom { .. } => Ok(state.clone()),
    }
}

/// Apply `edit` to a private copy of the list at `path` and write it back.
fn rewrite_list<F>(state: &Value, path: &Path, edit: F) -> Result<Value, StoreError>
where
    F: FnOnce(&mut Vec<Value>),
{
    let resolved = path.resolve();
    let mut list = state.list_in(&resolved)?;
    edit(Arc::make_mut(&mut list));
    state.set_in(&resolved, Value::List(list))
}

/// Negative indices count from the end; both directions clamp to the list.
fn splice_start(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(usize::try_from(index.unsigned_abs()).unwrap_or(usize::MAX))
    } else {
        usize::try_from(index).unwrap_or(usize::MAX).min(len)
    }
}
