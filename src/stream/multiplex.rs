use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::FrameRGBA;
use crate::stream::capture::SurfaceCapture;
use crate::stream::track::{AudioSpec, MediaTrack, TrackKind};

/// One unit of captured media, in capture order.
#[derive(Clone, Debug)]
pub enum MediaSample {
    Video {
        index: FrameIndex,
        frame: Arc<FrameRGBA>,
    },
    /// Interleaved samples at the stream's [`AudioSpec`].
    Audio { samples: Vec<f32> },
}

/// Live audio capture as handed to [`combine`].
#[derive(Debug)]
pub struct AudioCapture {
    pub track: MediaTrack,
    pub spec: AudioSpec,
}

/// A video capture plus at most one audio capture, consumed by the encoder.
///
/// Samples are queued in the order they were captured and handed out unchanged.
#[derive(Debug)]
pub struct CombinedStream {
    video: SurfaceCapture,
    audio: Option<AudioCapture>,
    queue: VecDeque<MediaSample>,
    detached: bool,
}

/// Wrap live captures into one stream.
///
/// An audio capture must already be flowing, so the first recorded segment is not missing its
/// audio.
pub fn combine(video: SurfaceCapture, audio: Option<AudioCapture>) -> ReelResult<CombinedStream> {
    if !video.track().is_flowing() {
        return Err(ReelError::validation("video capture is not flowing"));
    }
    if let Some(a) = audio.as_ref() {
        if a.track.kind() != TrackKind::Audio {
            return Err(ReelError::validation("audio capture carries a non-audio track"));
        }
        if !a.track.is_flowing() {
            return Err(ReelError::validation(
                "audio capture must be flowing before it is combined",
            ));
        }
    }
    Ok(CombinedStream {
        video,
        audio,
        queue: VecDeque::new(),
        detached: false,
    })
}

impl CombinedStream {
    pub fn fps(&self) -> Fps {
        self.video.fps()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn audio_spec(&self) -> Option<AudioSpec> {
        self.audio.as_ref().map(|a| a.spec)
    }

    pub fn video_frames(&self) -> u64 {
        self.video.emitted()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub(crate) fn push_video_frame(&mut self, frame: FrameRGBA, elapsed: Duration) {
        if self.detached {
            return;
        }
        for (index, frame) in self.video.capture(frame, elapsed) {
            self.queue.push_back(MediaSample::Video { index, frame });
        }
    }

    pub(crate) fn flush_video_to(&mut self, total: Duration) {
        if self.detached {
            return;
        }
        for (index, frame) in self.video.flush_to(total) {
            self.queue.push_back(MediaSample::Video { index, frame });
        }
    }

    pub(crate) fn push_audio(&mut self, samples: Vec<f32>) {
        if self.detached || samples.is_empty() {
            return;
        }
        if self.audio.as_ref().is_some_and(|a| a.track.is_flowing()) {
            self.queue.push_back(MediaSample::Audio { samples });
        }
    }

    /// Take everything captured since the last drain.
    pub(crate) fn drain(&mut self) -> Vec<MediaSample> {
        self.queue.drain(..).collect()
    }

    /// Stop every track and drop anything still queued. Idempotent.
    pub(crate) fn detach(&mut self) {
        self.video.stop();
        if let Some(a) = self.audio.as_mut() {
            a.track.stop();
        }
        self.queue.clear();
        self.detached = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/multiplex.rs"]
mod tests;
