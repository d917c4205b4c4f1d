//! Post-action records.
//!
//! Every pass produces one [`PostAction`]. Records are handed to every
//! subscriber once the dispatch that produced them has drained, so
//! observers never run inside the pipeline.

use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::Action;
use crate::lifecycle::CompletionHandle;
use crate::stream::{from_fanout, Fanout};
use crate::tree::Value;

/// What one pass did.
#[derive(Debug, Clone)]
pub struct PostAction {
    /// Snapshot the pass started from.
    pub initial_state: Value,
    /// Snapshot the pass produced.
    pub final_state: Value,
    /// The action as dispatched.
    pub initial_action: Action,
    /// The action after pre-processing; `None` when an async processor
    /// took the dispatch.
    pub executed_action: Option<Action>,
}

/// Hook invoked for each post-action record.
pub trait PostActionListener: Send + 'static {
    fn on_post_action(&mut self, record: &PostAction);
}

impl<F> PostActionListener for F
where
    F: FnMut(&PostAction) + Send + 'static,
{
    fn on_post_action(&mut self, record: &PostAction) {
        self(record)
    }
}

pub(crate) struct PostActionNotifier {
    subscribers: Fanout<PostAction>,
}

impl PostActionNotifier {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Fanout::new(),
        }
    }

    pub(crate) fn publish(&self, record: PostAction) {
        self.subscribers.send(record);
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<PostAction> {
        self.subscribers.subscribe()
    }
}

/// A running background listener.
///
/// Dropping the value leaves the listener running; call
/// [`Subscription::unsubscribe`] to stop it.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn unsubscribe(&self) {
        self.task.abort();
    }

    /// True once the listener has stopped, for whatever reason.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task feeding every record to `listener`. A panicking listener
/// is logged and keeps receiving later records.
pub(crate) fn spawn_listener<L>(
    receiver: mpsc::UnboundedReceiver<PostAction>,
    completion: CompletionHandle,
    mut listener: L,
) -> Subscription
where
    L: PostActionListener,
{
    let mut records = from_fanout(receiver, completion);
    let task = tokio::spawn(async move {
        while let Some(record) = records.next().await {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_post_action(&record)));
            if outcome.is_err() {
                tracing::error!(
                    action = record.initial_action.type_name(),
                    "Post-action listener panicked"
                );
            }
        }
    });
    Subscription::new(task)
}
