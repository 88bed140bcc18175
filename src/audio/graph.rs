use std::sync::Arc;
use std::time::Duration;

use crate::assets::source::{Fetcher, SourceRef};
use crate::audio::decode::{AudioPcm, MIX_CHANNELS, MIX_SAMPLE_RATE, PcmDecoder};
use crate::foundation::error::{ReelError, ReelResult};
use crate::session::resources::{LiveHandle, ResourceKind, ResourceLedger};
use crate::stream::track::{AudioSpec, MediaTrack, TrackKind};

/// One background music selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioTrack {
    /// Catalog id, or a caller-chosen id for uploads.
    pub id: String,
    /// Human-readable name.
    pub label: String,
    /// Where the encoded audio lives.
    pub source: SourceRef,
}

impl AudioTrack {
    pub fn new(id: impl Into<String>, label: impl Into<String>, source: SourceRef) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            source,
        }
    }
}

/// Audible destination for the live preview.
pub trait PreviewSink: Send {
    /// Play interleaved samples at the graph's [`AudioSpec`].
    fn write(&mut self, samples: &[f32]) -> ReelResult<()>;

    fn close(&mut self) {}
}

/// Preview destination that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn write(&mut self, _samples: &[f32]) -> ReelResult<()> {
        Ok(())
    }
}

/// Native audio routing context. At most one is open per session.
#[derive(Debug)]
pub(crate) struct AudioContext {
    handle: LiveHandle,
}

impl AudioContext {
    fn open(ledger: &Arc<ResourceLedger>) -> Self {
        Self {
            handle: ledger.acquire(ResourceKind::AudioContext),
        }
    }

    /// Idempotent.
    pub(crate) fn close(&mut self) {
        self.handle.release();
    }

    pub(crate) fn is_open(&self) -> bool {
        self.handle.is_live()
    }
}

/// Playback node over a decoded buffer. Always loops: reaching the end wraps to frame zero with
/// no gap.
#[derive(Debug)]
pub struct LoopingSource {
    pcm: Arc<AudioPcm>,
    cursor: usize,
    playing: bool,
    loops: u64,
}

impl LoopingSource {
    pub fn new(pcm: Arc<AudioPcm>) -> Self {
        Self {
            pcm,
            cursor: 0,
            playing: false,
            loops: 0,
        }
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// How many times playback wrapped back to the start.
    pub fn loops_completed(&self) -> u64 {
        self.loops
    }

    /// Produce the next `frames` sample frames. A stopped source yields silence.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let ch = usize::from(self.pcm.channels.max(1));
        let total = self.pcm.frames();
        if !self.playing || total == 0 {
            return vec![0.0; frames * ch];
        }

        let mut out = Vec::with_capacity(frames * ch);
        let mut left = frames;
        while left > 0 {
            let n = left.min(total - self.cursor);
            let start = self.cursor * ch;
            out.extend_from_slice(&self.pcm.interleaved_f32[start..start + n * ch]);
            self.cursor += n;
            left -= n;
            if self.cursor == total {
                self.cursor = 0;
                self.loops += 1;
            }
        }
        out
    }
}

/// The routing graph: one looping source fanned out to a preview sink and a capture track.
pub struct AudioGraph {
    track: AudioTrack,
    context: AudioContext,
    source: LoopingSource,
    preview: Option<Box<dyn PreviewSink>>,
    spec: AudioSpec,
    decoded: Duration,
    rendered_frames: u64,
}

impl AudioGraph {
    pub fn track(&self) -> &AudioTrack {
        &self.track
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// Length of one pass through the decoded buffer.
    pub fn decoded_duration(&self) -> Duration {
        self.decoded
    }

    pub fn loops_completed(&self) -> u64 {
        self.source.loops_completed()
    }

    pub fn is_closed(&self) -> bool {
        !self.context.is_open()
    }

    /// Start the source node.
    pub fn start(&mut self) {
        if self.context.is_open() {
            self.source.start();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.context.is_open() && self.source.is_playing()
    }

    /// Capturable destination. The returned track is flowing if the source is already playing.
    pub fn capture_track(&self, ledger: &Arc<ResourceLedger>) -> MediaTrack {
        let mut track = MediaTrack::new(TrackKind::Audio, ledger);
        if self.is_playing() {
            track.mark_flowing();
        }
        track
    }

    /// Render everything between the last pump and `elapsed` since the source started.
    ///
    /// The samples go to the preview and are returned for the capture track. A preview that
    /// fails is disconnected; capture is unaffected.
    pub fn pump_to(&mut self, elapsed: Duration) -> Vec<f32> {
        if !self.is_playing() {
            return Vec::new();
        }
        let target = (elapsed.as_nanos() * u128::from(self.spec.sample_rate) / 1_000_000_000)
            as u64;
        if target <= self.rendered_frames {
            return Vec::new();
        }
        let frames = (target - self.rendered_frames) as usize;
        let samples = self.source.render(frames);
        self.rendered_frames = target;

        if let Some(preview) = self.preview.as_mut()
            && let Err(e) = preview.write(&samples)
        {
            tracing::warn!(error = %e, "audio preview failed; disconnecting it");
            if let Some(mut p) = self.preview.take() {
                p.close();
            }
        }
        samples
    }

    /// Stop the source, disconnect the preview and close the context. Idempotent.
    pub fn close(&mut self) {
        self.source.stop();
        if let Some(mut p) = self.preview.take() {
            p.close();
        }
        if self.context.is_open() {
            tracing::debug!(track = %self.track.id, "closing audio context");
        }
        self.context.close();
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("track", &self.track)
            .field("spec", &self.spec)
            .field("closed", &self.is_closed())
            .field("rendered_frames", &self.rendered_frames)
            .finish_non_exhaustive()
    }
}

/// Fetches, decodes and wires up one [`AudioTrack`].
#[derive(Clone, Debug)]
pub struct AudioGraphBuilder {
    fetcher: Arc<Fetcher>,
    decoder: Arc<dyn PcmDecoder>,
    ledger: Arc<ResourceLedger>,
}

impl AudioGraphBuilder {
    pub fn new(
        fetcher: Arc<Fetcher>,
        decoder: Arc<dyn PcmDecoder>,
        ledger: Arc<ResourceLedger>,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            ledger,
        }
    }

    /// Every failure is an [`ReelError::AudioSetup`]. The audio context is only opened once the
    /// track decoded, so a failed build holds no resources.
    pub async fn build(
        &self,
        track: &AudioTrack,
        preview: Box<dyn PreviewSink>,
    ) -> ReelResult<AudioGraph> {
        let bytes = self
            .fetcher
            .fetch(&track.source)
            .await
            .map_err(|e| ReelError::audio_setup(format!("{}: {e}", track.source)))?;

        let decoder = Arc::clone(&self.decoder);
        let pcm = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| ReelError::audio_setup(format!("decode task: {e}")))?
            .map_err(|e| match e {
                ReelError::AudioSetup(_) => e,
                other => ReelError::audio_setup(other.to_string()),
            })?;

        if pcm.is_empty() {
            return Err(ReelError::audio_setup(format!(
                "{}: decoded to zero samples",
                track.source
            )));
        }
        if pcm.sample_rate != MIX_SAMPLE_RATE || pcm.channels != MIX_CHANNELS {
            return Err(ReelError::audio_setup(format!(
                "decoder produced {} Hz / {} ch, expected {MIX_SAMPLE_RATE} Hz / {MIX_CHANNELS} ch",
                pcm.sample_rate, pcm.channels
            )));
        }

        let decoded = pcm.duration();
        tracing::info!(
            track = %track.id,
            label = %track.label,
            decoded_ms = decoded.as_millis() as u64,
            "audio track decoded"
        );
        Ok(AudioGraph {
            track: track.clone(),
            context: AudioContext::open(&self.ledger),
            spec: AudioSpec {
                sample_rate: pcm.sample_rate,
                channels: pcm.channels,
            },
            source: LoopingSource::new(Arc::new(pcm)),
            preview: Some(preview),
            decoded,
            rendered_frames: 0,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/graph.rs"]
mod tests;
