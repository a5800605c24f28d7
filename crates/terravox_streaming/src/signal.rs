//! # Abort Signal
//!
//! Session-wide cancellation flag.
//!
//! Aborting never cancels work already handed to the worker pool; it only
//! makes every completion path drop its result instead of committing it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct SignalInner {
    aborted: AtomicBool,
    notify: Notify,
}

/// Cloneable abort signal shared by everything a session owns.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    /// Creates a signal in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the session. Idempotent.
    pub fn abort(&self) {
        if !self.inner.aborted.swap(true, Ordering::SeqCst) {
            tracing::debug!("session abort signalled");
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns true once the session has been aborted.
    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Completes when the session is aborted.
    pub async fn aborted(&self) {
        // register before checking the flag so a concurrent abort is not missed
        let notified = self.inner.notify.notified();
        if self.is_aborted() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_shared_by_clones() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_aborted());

        signal.abort();
        signal.abort();
        assert!(clone.is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_completes_after_abort() {
        let signal = AbortSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.aborted().await })
        };

        tokio::task::yield_now().await;
        signal.abort();
        waiter.await.unwrap();

        // already aborted: returns immediately
        signal.aborted().await;
    }
}
