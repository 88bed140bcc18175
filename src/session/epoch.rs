use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generation stamp for one session.
///
/// Work started on behalf of a session carries its guard; results are applied only while
/// [`EpochGuard::is_current`] holds. Starting a newer session or revoking this one makes every
/// outstanding guard stale.
#[derive(Clone, Debug)]
pub struct EpochGuard {
    counter: Arc<AtomicU64>,
    epoch: u64,
}

impl EpochGuard {
    /// Advance the shared counter and return a guard for the new generation.
    pub(crate) fn begin(counter: &Arc<AtomicU64>) -> Self {
        let epoch = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            counter: Arc::clone(counter),
            epoch,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.epoch
    }

    /// Make this generation stale. No-op when a newer one already exists.
    pub(crate) fn revoke(&self) {
        let _ = self.counter.compare_exchange(
            self.epoch,
            self.epoch + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
