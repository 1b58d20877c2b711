//! Shared cancellation signal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// A blocked waiter that must re-check its tokens when cancellation fires.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

#[derive(Default)]
struct Shared {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn Wake>>>,
}

/// Cooperative cancellation flag shared between a caller and its workers.
///
/// Cancelling stops workers from picking up new items and wakes anyone blocked
/// on a gate slot. Work that is already running, including external
/// processes, is left to finish.
#[derive(Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let waiters = std::mem::take(&mut *self.waiters());
        for waiter in waiters.iter().filter_map(Weak::upgrade) {
            waiter.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Ask to be woken when this token is cancelled.
    ///
    /// Registration must happen before the waiter's last `is_cancelled` check
    /// so a concurrent `cancel` either is seen or delivers the wake.
    pub(crate) fn register(&self, waiter: Weak<dyn Wake>) {
        let mut waiters = self.waiters();
        if self.is_cancelled() {
            return;
        }
        waiters.retain(|w| w.strong_count() > 0);
        if !waiters.iter().any(|w| Weak::ptr_eq(w, &waiter)) {
            waiters.push(waiter);
        }
    }

    fn waiters(&self) -> MutexGuard<'_, Vec<Weak<dyn Wake>>> {
        self.shared
            .waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
