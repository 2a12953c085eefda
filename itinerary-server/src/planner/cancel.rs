//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

/// A flag searches poll between expansions, also awaitable.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<Inner>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake everyone waiting on it.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Resolves once the flag is raised.
    pub async fn canceled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a concurrent cancel cannot slip between
        notified.as_mut().enable();
        if self.is_canceled() {
            return;
        }
        notified.await;
    }
}
