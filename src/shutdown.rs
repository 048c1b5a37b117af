//! Cooperative shutdown flag shared between the engine and its controller.
//!
//! The engine only polls [`ShutdownSignal::is_set`] between crawl attempts;
//! an in-flight fetch is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    is_set: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to a shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Waiters are notified exactly once.
    pub fn set(&self) {
        if !self.inner.is_set.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_set(&self) -> bool {
        self.inner.is_set.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}
