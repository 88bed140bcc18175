use std::sync::Arc;
use std::time::Duration;

use crate::foundation::core::{Fps, FrameIndex};
use crate::render::frame::FrameRGBA;
use crate::stream::track::MediaTrack;

/// Live video capture of the rendering surface at a fixed frame rate.
///
/// Slot `k` is due at `k` frame intervals. Each capture emits every due slot not yet emitted,
/// repeating the newest frame when ticks arrive late.
#[derive(Debug)]
pub struct SurfaceCapture {
    fps: Fps,
    track: MediaTrack,
    emitted: u64,
    latest: Option<Arc<FrameRGBA>>,
}

impl SurfaceCapture {
    pub(crate) fn new(fps: Fps, mut track: MediaTrack) -> Self {
        track.mark_flowing();
        Self {
            fps,
            track,
            emitted: 0,
            latest: None,
        }
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Slots emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn track(&self) -> &MediaTrack {
        &self.track
    }

    /// Record the frame drawn at `elapsed` and return the slots that became due.
    pub(crate) fn capture(
        &mut self,
        frame: FrameRGBA,
        elapsed: Duration,
    ) -> Vec<(FrameIndex, Arc<FrameRGBA>)> {
        if !self.track.is_flowing() {
            return Vec::new();
        }
        let frame = Arc::new(frame);
        self.latest = Some(Arc::clone(&frame));
        let due = self.fps.frames_due(elapsed);
        self.emit_until(due, &frame)
    }

    /// Emit the remaining slots needed to cover `total` with the newest frame.
    pub(crate) fn flush_to(&mut self, total: Duration) -> Vec<(FrameIndex, Arc<FrameRGBA>)> {
        if !self.track.is_flowing() {
            return Vec::new();
        }
        let Some(frame) = self.latest.clone() else {
            return Vec::new();
        };
        let target = self.fps.frames_to_cover(total);
        self.emit_until(target, &frame)
    }

    fn emit_until(
        &mut self,
        target: u64,
        frame: &Arc<FrameRGBA>,
    ) -> Vec<(FrameIndex, Arc<FrameRGBA>)> {
        let mut out = Vec::new();
        while self.emitted < target {
            out.push((FrameIndex(self.emitted), Arc::clone(frame)));
            self.emitted += 1;
        }
        out
    }

    pub(crate) fn stop(&mut self) {
        self.track.stop();
        self.latest = None;
    }
}
