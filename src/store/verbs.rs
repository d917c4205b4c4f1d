//! Shorthands that build and dispatch the built-in verbs.

use std::cmp::Ordering;

use super::Store;
use crate::action::Action;
use crate::error::StoreError;
use crate::path::Path;
use crate::tree::Value;

impl Store {
    /// Replace the whole tree.
    pub fn set(&self, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::set(value))
    }

    pub fn set_in(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::set_in(path, value))
    }

    /// Deep-merge `value` into the value at `path`.
    pub fn patch(&self, path: impl Into<Path>, value: impl Into<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::patch(path, value))
    }

    /// Replace the value at `path` with `operation(current)`.
    pub fn apply<F>(&self, path: impl Into<Path>, operation: F) -> Result<&Self, StoreError>
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.dispatch(Action::apply(path, operation))
    }

    /// Remove `key` from the map at `path`.
    pub fn delete(&self, path: impl Into<Path>, key: impl Into<String>) -> Result<&Self, StoreError> {
        self.dispatch(Action::delete(path, key))
    }

    pub fn list_push(&self, path: impl Into<Path>, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_push(path, items))
    }

    pub fn list_pop(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_pop(path))
    }

    pub fn list_shift(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_shift(path))
    }

    pub fn list_unshift(&self, path: impl Into<Path>, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_unshift(path, items))
    }

    pub fn list_splice(
        &self,
        path: impl Into<Path>,
        index: i64,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_splice(path, index, delete_count, items))
    }

    /// Splice without removing anything.
    pub fn list_insert(&self, path: impl Into<Path>, index: i64, items: Vec<Value>) -> Result<&Self, StoreError> {
        self.list_splice(path, index, 0, items)
    }

    /// Splice without inserting anything.
    pub fn list_remove_at(&self, path: impl Into<Path>, index: i64, delete_count: usize) -> Result<&Self, StoreError> {
        self.list_splice(path, index, delete_count, Vec::new())
    }

    /// Remove the first element matching `predicate` in the current list.
    /// Nothing is dispatched when no element matches.
    pub fn list_remove_find<F>(&self, path: impl Into<Path>, predicate: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, usize, &[Value]) -> bool,
    {
        self.list_remove_find_n(path, predicate, 1)
    }

    /// Remove `delete_count` elements starting at the first one matching
    /// `predicate`.
    pub fn list_remove_find_n<F>(
        &self,
        path: impl Into<Path>,
        predicate: F,
        delete_count: usize,
    ) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, usize, &[Value]) -> bool,
    {
        let path = path.into();
        let list = self.peek().list_in(&path.resolve())?;
        let found = list
            .iter()
            .enumerate()
            .position(|(index, item)| predicate(item, index, &list));
        match found {
            Some(index) => self.list_remove_at(path, index_of(index), delete_count),
            None => Ok(self),
        }
    }

    /// Sort using the total value order.
    pub fn list_sort(&self, path: impl Into<Path>) -> Result<&Self, StoreError> {
        self.dispatch(Action::list_sort(path))
    }

    pub fn list_sort_by<F>(&self, path: impl Into<Path>, compare: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.dispatch(Action::list_sort_by(path, compare))
    }

    /// Keep the elements for which `predicate(item, index, list)` holds.
    pub fn list_filter<F>(&self, path: impl Into<Path>, predicate: F) -> Result<&Self, StoreError>
    where
        F: Fn(&Value, usize, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.dispatch(Action::list_filter(path, predicate))
    }
}

fn index_of(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}
