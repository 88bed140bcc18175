use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Kinds of native resources a session acquires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// An audio routing context.
    AudioContext,
    /// A live video or audio capture track.
    MediaTrack,
}

/// Point-in-time view of the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Audio contexts opened and not yet closed.
    pub live_audio_contexts: usize,
    /// Media tracks started and not yet stopped.
    pub live_media_tracks: usize,
    /// Highest number of audio contexts ever open at the same time.
    pub peak_audio_contexts: usize,
}

impl LedgerSnapshot {
    /// `true` when nothing is left open.
    pub fn is_quiescent(&self) -> bool {
        self.live_audio_contexts == 0 && self.live_media_tracks == 0
    }
}

/// Shared counters of live native resources.
///
/// Every [`LiveHandle`] registers itself here on creation and deregisters exactly once, on
/// `release()` or on drop, whichever comes first.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    audio_contexts: AtomicUsize,
    media_tracks: AtomicUsize,
    peak_audio_contexts: AtomicUsize,
}

impl ResourceLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            live_audio_contexts: self.audio_contexts.load(Ordering::SeqCst),
            live_media_tracks: self.media_tracks.load(Ordering::SeqCst),
            peak_audio_contexts: self.peak_audio_contexts.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn acquire(self: &Arc<Self>, kind: ResourceKind) -> LiveHandle {
        match kind {
            ResourceKind::AudioContext => {
                let now = self.audio_contexts.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_audio_contexts.fetch_max(now, Ordering::SeqCst);
            }
            ResourceKind::MediaTrack => {
                self.media_tracks.fetch_add(1, Ordering::SeqCst);
            }
        }
        LiveHandle {
            ledger: Arc::clone(self),
            kind,
            released: false,
        }
    }

    fn release(&self, kind: ResourceKind) {
        let counter = match kind {
            ResourceKind::AudioContext => &self.audio_contexts,
            ResourceKind::MediaTrack => &self.media_tracks,
        };
        // Saturate rather than wrap if accounting is ever off.
        let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some(v.saturating_sub(1))
        });
    }
}

/// Registration of one live resource in a [`ResourceLedger`].
#[derive(Debug)]
pub(crate) struct LiveHandle {
    ledger: Arc<ResourceLedger>,
    kind: ResourceKind,
    released: bool,
}

impl LiveHandle {
    /// Deregister. Idempotent.
    pub(crate) fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ledger.release(self.kind);
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.released
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.release();
    }
}
