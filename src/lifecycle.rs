//! One-shot completion signalling for stores and scopes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Owner side: flips once, wakes every waiter.
pub struct CompletionSignal {
    completed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self {
            completed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signal completion. Returns `true` only for the call that flipped it.
    pub fn complete(&self) -> bool {
        if self.completed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// True while any [`CompletionHandle`] is alive.
    pub fn has_observers(&self) -> bool {
        Arc::strong_count(&self.completed) > 1
    }

    /// Create a handle for streams and tasks that must stop on completion.
    pub fn handle(&self) -> CompletionHandle {
        CompletionHandle {
            completed: Arc::clone(&self.completed),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a [`CompletionSignal`].
#[derive(Clone)]
pub struct CompletionHandle {
    completed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CompletionHandle {
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Resolve once the owner has completed.
    pub async fn wait(&self) {
        // Register with Notify before reading the flag, otherwise a
        // completion between the check and the await is lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_completed() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_first_complete_reports_true() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_completed());
        assert!(signal.complete());
        assert!(!signal.complete());
        assert!(signal.handle().is_completed());
    }

    #[tokio::test]
    async fn wait_returns_after_completion() {
        let signal = CompletionSignal::new();
        let handle = signal.handle();
        let waiter = tokio::spawn(async move { handle.wait().await });
        tokio::task::yield_now().await;
        signal.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_after_completion_is_immediate() {
        let signal = CompletionSignal::new();
        signal.complete();
        signal.handle().wait().await;
    }
}
