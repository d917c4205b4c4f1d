//! Constructors for [`AsyncSource`].
//!
//! Only the first item of a source is ever used; later items are dropped
//! together with the source.

use std::future::Future;

use futures::stream::{self, StreamExt};
use futures_core::Stream;

use super::AsyncSource;
use crate::tree::Value;

/// Resolve once with the future's output.
pub fn from_future<F>(future: F) -> AsyncSource
where
    F: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    stream::once(future).boxed()
}

/// Emit `value` immediately.
pub fn ready(value: impl Into<Value>) -> AsyncSource {
    stream::iter([Ok(value.into())]).boxed()
}

/// Fail immediately.
pub fn failed(error: impl Into<anyhow::Error>) -> AsyncSource {
    stream::iter([Err(error.into())]).boxed()
}

/// End without emitting.
pub fn completed() -> AsyncSource {
    stream::empty().boxed()
}

pub fn from_stream<S>(source: S) -> AsyncSource
where
    S: Stream<Item = anyhow::Result<Value>> + Send + 'static,
{
    source.boxed()
}
