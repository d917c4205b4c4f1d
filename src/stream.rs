//! Turning store channels into completion-aware streams.
//!
//! Actions and post-action records go through a [`Fanout`]: every
//! subscriber has its own unbounded queue and sees every item in order.
//! Snapshots go through a bounded broadcast channel, where a lagging
//! subscriber only needs the latest value.

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::lifecycle::CompletionHandle;

/// Lossless one-to-many channel.
pub(crate) struct Fanout<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Fanout<T> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Queue `item` for every live subscriber. Subscribers whose receiver
    /// is gone are dropped.
    pub(crate) fn send(&self, item: T) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(item.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Stream every queued item of `receiver` until `completion` fires or the
/// fan-out is dropped.
///
/// Items already queued when completion fires are still delivered.
pub(crate) fn from_fanout<T>(
    receiver: mpsc::UnboundedReceiver<T>,
    completion: CompletionHandle,
) -> BoxStream<'static, T>
where
    T: Send + 'static,
{
    stream::unfold((receiver, completion), |(mut receiver, completion)| async move {
        let received = tokio::select! {
            biased;
            received = receiver.recv() => received,
            _ = completion.wait() => None,
        };
        received.map(|item| (item, (receiver, completion)))
    })
    .boxed()
}

/// Stream every message of `receiver` until `completion` fires or the
/// channel closes.
///
/// Messages already buffered when completion fires are still delivered.
/// A subscriber that falls behind skips the overwritten messages.
pub(crate) fn from_broadcast<T>(
    receiver: broadcast::Receiver<T>,
    completion: CompletionHandle,
    channel: &'static str,
) -> BoxStream<'static, T>
where
    T: Clone + Send + 'static,
{
    stream::unfold((receiver, completion), move |(mut receiver, completion)| async move {
        loop {
            let received = tokio::select! {
                biased;
                received = receiver.recv() => received,
                _ = completion.wait() => return None,
            };
            match received {
                Ok(item) => return Some((item, (receiver, completion))),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel, skipped, "Subscriber lagged behind, skipping messages");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CompletionSignal;

    #[tokio::test]
    async fn buffered_messages_survive_completion() {
        let (sender, receiver) = broadcast::channel(8);
        let signal = CompletionSignal::new();
        let stream = from_broadcast(receiver, signal.handle(), "test");
        sender.send(1).unwrap();
        sender.send(2).unwrap();
        signal.complete();
        assert_eq!(stream.collect::<Vec<_>>().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let (sender, receiver) = broadcast::channel(2);
        let signal = CompletionSignal::new();
        let stream = from_broadcast(receiver, signal.handle(), "test");
        for i in 0..5 {
            sender.send(i).unwrap();
        }
        drop(sender);
        assert_eq!(stream.collect::<Vec<_>>().await, vec![3, 4]);
    }

    #[tokio::test]
    async fn fanout_keeps_every_item_for_a_slow_subscriber() {
        let fanout = Fanout::new();
        let signal = CompletionSignal::new();
        let stream = from_fanout(fanout.subscribe(), signal.handle());
        for i in 0..1000 {
            fanout.send(i);
        }
        signal.complete();
        assert_eq!(stream.collect::<Vec<_>>().await, (0..1000).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn fanout_prunes_dropped_subscribers() {
        let fanout = Fanout::new();
        let signal = CompletionSignal::new();
        let kept = from_fanout(fanout.subscribe(), signal.handle());
        drop(from_fanout(fanout.subscribe(), signal.handle()));

        fanout.send("a");
        assert_eq!(fanout.subscriber_count(), 1);

        drop(fanout);
        assert_eq!(kept.collect::<Vec<_>>().await, vec!["a"]);
    }
}
