//! One-way stop signal shared between the main thread and the filler.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    stopped: AtomicBool,
    reason: RwLock<Option<String>>,
    /// Held by the filler for the duration of each write, and by `stop`.
    gate: Mutex<()>,
}

/// A cloneable, set-once stop flag.
///
/// Stopping is idempotent: only the first reason is kept. `stop` takes the
/// same lock that [`GatedWriter`](super::GatedWriter) holds while writing,
/// so when `stop` returns no filler write is in flight and none will follow.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal. Returns true if this call was the one that set it.
    pub fn stop(&self, reason: impl Into<String>) -> bool {
        let _gate = self.inner.gate.lock();
        if self
            .inner
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.inner.reason.write() = Some(reason.into());
            true
        } else {
            false
        }
    }

    /// Returns whether the signal is set.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Returns the stop reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    pub(super) fn gate(&self) -> MutexGuard<'_, ()> {
        self.inner.gate.lock()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .field("reason", &self.reason())
            .finish()
    }
}
