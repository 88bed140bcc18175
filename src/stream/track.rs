use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::session::resources::{LiveHandle, ResourceKind, ResourceLedger};

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Format of the samples an audio track carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A live capture track. Registered in the session's ledger until stopped or dropped.
#[derive(Debug)]
pub struct MediaTrack {
    id: u64,
    kind: TrackKind,
    handle: LiveHandle,
    flowing: bool,
}

impl MediaTrack {
    pub(crate) fn new(kind: TrackKind, ledger: &Arc<ResourceLedger>) -> Self {
        Self {
            id: NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            handle: ledger.acquire(ResourceKind::MediaTrack),
            flowing: false,
        }
    }

    /// Samples are being produced on this track.
    pub(crate) fn mark_flowing(&mut self) {
        if self.handle.is_live() {
            self.flowing = true;
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    pub fn is_flowing(&self) -> bool {
        self.flowing && self.handle.is_live()
    }

    /// Stop the track. Idempotent.
    pub fn stop(&mut self) {
        self.flowing = false;
        self.handle.release();
    }
}
