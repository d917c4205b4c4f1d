//! Derived streams over sub-paths of the tree.
//!
//! A selection reads the value at a resolved path from every snapshot and
//! drops consecutive repeats. [`SelectSettings`] then applies, always in this
//! order: debounce, pre-filter, map, post-filter.

use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use crate::path::Path;
use crate::store::{Store, WeakStore};
use crate::tree::Value;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Mapper<I, M> = Box<dyn Fn(I, &Store) -> M + Send + Sync>;

/// Optional stages of a selection. `I` is the selected item, `M` the item
/// after mapping.
pub struct SelectSettings<I, M = I> {
    debounce: Option<Duration>,
    pre_filter: Option<Predicate<I>>,
    map: Mapper<I, M>,
    post_filter: Option<Predicate<M>>,
}

impl<I: Send + 'static> SelectSettings<I, I> {
    pub fn new() -> Self {
        Self {
            debounce: None,
            pre_filter: None,
            map: Box::new(|item, _| item),
            post_filter: None,
        }
    }
}

impl<I: Send + 'static> Default for SelectSettings<I, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, M> SelectSettings<I, M>
where
    I: Send + 'static,
    M: Send + 'static,
{
    /// Emit only after `window` has passed without a newer value. A zero
    /// window disables debouncing.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    pub fn pre_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.pre_filter = Some(Box::new(predicate));
        self
    }

    /// Transform each item; the store is passed for context.
    ///
    /// Replaces any earlier map and clears the post-filter, whose item type
    /// no longer fits.
    pub fn map<N, F>(self, mapper: F) -> SelectSettings<I, N>
    where
        F: Fn(I, &Store) -> N + Send + Sync + 'static,
    {
        SelectSettings {
            debounce: self.debounce,
            pre_filter: self.pre_filter,
            map: Box::new(mapper),
            post_filter: None,
        }
    }

    pub fn post_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.post_filter = Some(Box::new(predicate));
        self
    }

    pub(crate) fn apply(self, input: BoxStream<'static, I>, store: WeakStore) -> BoxStream<'static, M> {
        let input = match self.debounce {
            Some(window) if !window.is_zero() => debounce(input, window),
            _ => input,
        };
        let SelectSettings {
            pre_filter,
            map,
            post_filter,
            ..
        } = self;

        input
            .filter(move |item| future::ready(pre_filter.as_ref().map_or(true, |keep| keep(item))))
            .filter_map(move |item| future::ready(store.upgrade().map(|store| map(item, &store))))
            .filter(move |item| future::ready(post_filter.as_ref().map_or(true, |keep| keep(item))))
            .boxed()
    }
}

/// Suppress items equal to the previous emitted one.
pub(crate) fn distinct<T>(input: BoxStream<'static, T>) -> BoxStream<'static, T>
where
    T: Clone + PartialEq + Send + 'static,
{
    let mut last: Option<T> = None;
    input
        .filter_map(move |item| {
            let fresh = last.as_ref() != Some(&item);
            if fresh {
                last = Some(item.clone());
            }
            future::ready(fresh.then_some(item))
        })
        .boxed()
}

/// Hold each item until `window` passes without a newer one. The last
/// pending item is flushed when the input ends.
pub(crate) fn debounce<T>(input: BoxStream<'static, T>, window: Duration) -> BoxStream<'static, T>
where
    T: Send + 'static,
{
    stream::unfold((input.fuse(), None::<T>), move |(mut input, mut pending)| async move {
        loop {
            let Some(item) = pending.take() else {
                pending = Some(input.next().await?);
                continue;
            };
            tokio::select! {
                newer = input.next() => match newer {
                    Some(newer) => pending = Some(newer),
                    None => return Some((item, (input, None))),
                },
                _ = tokio::time::sleep(window) => return Some((item, (input, None))),
            }
        }
    })
    .boxed()
}

impl Store {
    /// The value at the resolved `path`, re-emitted whenever it changes,
    /// starting with the current one.
    pub fn select(&self, path: impl Into<Path>) -> BoxStream<'static, Option<Value>> {
        let path = path.into().resolve();
        distinct(
            self.source()
                .map(move |state| state.get_in(&path).cloned())
                .boxed(),
        )
    }

    pub fn select_with<M>(
        &self,
        path: impl Into<Path>,
        settings: SelectSettings<Option<Value>, M>,
    ) -> BoxStream<'static, M>
    where
        M: Send + 'static,
    {
        settings.apply(self.select(path), self.downgrade())
    }

    /// Like [`Store::select`], converted to plain JSON.
    ///
    /// The conversion walks the whole selected subtree on every snapshot.
    pub fn select_flatten(&self, path: impl Into<Path>) -> BoxStream<'static, Option<serde_json::Value>> {
        let path = path.into().resolve();
        distinct(
            self.source()
                .map(move |state| state.get_in(&path).map(Value::to_json))
                .boxed(),
        )
    }

    pub fn select_flatten_with<M>(
        &self,
        path: impl Into<Path>,
        settings: SelectSettings<Option<serde_json::Value>, M>,
    ) -> BoxStream<'static, M>
    where
        M: Send + 'static,
    {
        settings.apply(self.select_flatten(path), self.downgrade())
    }
}
