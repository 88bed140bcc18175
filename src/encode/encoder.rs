use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::encode::format::{ChosenFormat, MimeType};
use crate::encode::runtime::{MediaRecorder, MediaRuntime, RecorderKill, RecorderSpec};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::stream::multiplex::{CombinedStream, MediaSample};

/// The finished artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedOutput {
    /// Every chunk, concatenated in arrival order.
    pub bytes: Bytes,
    /// Container/codecs of `bytes`.
    pub mime_type: String,
    /// `frame_count` frame intervals.
    pub nominal_duration: Duration,
    /// Video frames recorded.
    pub frame_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Recording,
    Finalizing,
    Complete,
    Failed,
}

impl EncoderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Recording parameters that do not come from the stream itself.
#[derive(Clone, Copy, Debug)]
pub struct EncoderSettings {
    pub canvas: Canvas,
    pub chunk_interval: Duration,
    pub background_rgba: [u8; 4],
}

/// Drives one [`MediaRecorder`] from a [`CombinedStream`] and assembles its chunks.
pub struct Encoder {
    runtime: Arc<dyn MediaRuntime>,
    state: EncoderState,
    recorder: Option<Box<dyn MediaRecorder>>,
    kill: Option<RecorderKill>,
    chunks: Vec<Bytes>,
    mime: Option<MimeType>,
    fps: Option<Fps>,
    frames: u64,
}

impl Encoder {
    pub fn new(runtime: Arc<dyn MediaRuntime>) -> Self {
        Self {
            runtime,
            state: EncoderState::Idle,
            recorder: None,
            kill: None,
            chunks: Vec::new(),
            mime: None,
            fps: None,
            frames: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Chunks received so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn frames_recorded(&self) -> u64 {
        self.frames
    }

    /// Stops the live recording from another thread. `None` before `start`.
    pub fn kill_handle(&self) -> Option<RecorderKill> {
        self.kill.clone()
    }

    /// `Idle -> Recording`.
    pub fn start(
        &mut self,
        stream: &CombinedStream,
        format: &ChosenFormat,
        settings: EncoderSettings,
    ) -> ReelResult<()> {
        if self.state != EncoderState::Idle {
            return Err(ReelError::InvalidTransition(format!(
                "encoder start from {:?}",
                self.state
            )));
        }
        let mime = format.effective_mime(stream.has_audio());
        let spec = RecorderSpec {
            mime: mime.clone(),
            canvas: settings.canvas,
            fps: stream.fps(),
            audio: stream.audio_spec(),
            chunk_interval: settings.chunk_interval,
            background_rgba: settings.background_rgba,
        };
        let res = self
            .runtime
            .create_recorder(&spec)
            .and_then(|mut rec| {
                // The first chunk is available straight away.
                let first = rec.poll_chunks()?;
                Ok((rec, first))
            });
        match res {
            Ok((rec, first)) => {
                self.chunks.extend(first);
                self.kill = Some(rec.kill_handle());
                self.recorder = Some(rec);
                self.mime = Some(mime);
                self.fps = Some(spec.fps);
                self.state = EncoderState::Recording;
                tracing::info!(
                    format = %spec.mime,
                    runtime = self.runtime.name(),
                    audio = spec.audio.is_some(),
                    "recording started"
                );
                Ok(())
            }
            Err(e) => {
                self.state = EncoderState::Failed;
                Err(e)
            }
        }
    }

    /// Hand captured samples to the recorder and collect any finished chunks.
    pub fn feed(&mut self, samples: Vec<MediaSample>) -> ReelResult<()> {
        if self.state != EncoderState::Recording {
            return Err(ReelError::InvalidTransition(format!(
                "encoder feed while {:?}",
                self.state
            )));
        }
        let res = self.write_all(samples);
        if let Err(e) = res {
            self.fail();
            return Err(e);
        }
        Ok(())
    }

    fn write_all(&mut self, samples: Vec<MediaSample>) -> ReelResult<()> {
        let Some(rec) = self.recorder.as_mut() else {
            return Err(ReelError::encode("encoder has no recorder"));
        };
        for sample in samples {
            match sample {
                MediaSample::Video { index, frame } => {
                    rec.write_video(index, &frame)?;
                    self.frames += 1;
                }
                MediaSample::Audio { samples } => rec.write_audio(&samples)?,
            }
        }
        self.chunks.extend(rec.poll_chunks()?);
        Ok(())
    }

    /// `Recording -> Finalizing -> Complete`, returning the assembled artifact.
    ///
    /// Any failure leaves the encoder `Failed`.
    pub fn stop(&mut self) -> ReelResult<EncodedOutput> {
        if self.state != EncoderState::Recording {
            return Err(ReelError::InvalidTransition(format!(
                "encoder stop while {:?}",
                self.state
            )));
        }
        self.state = EncoderState::Finalizing;
        let Some(rec) = self.recorder.take() else {
            self.state = EncoderState::Failed;
            return Err(ReelError::encode("encoder has no recorder"));
        };
        let tail = match rec.finish() {
            Ok(t) => t,
            Err(e) => {
                self.chunks.clear();
                self.state = EncoderState::Failed;
                return Err(e);
            }
        };
        self.chunks.extend(tail);

        let total: usize = self.chunks.iter().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for c in self.chunks.drain(..) {
            buf.extend_from_slice(&c);
        }
        let nominal_duration = self
            .fps
            .map(|f| f.frames_to_duration_ceil(self.frames))
            .unwrap_or_default();
        let mime_type = self
            .mime
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        self.state = EncoderState::Complete;
        tracing::info!(
            bytes = total,
            frames = self.frames,
            duration_ms = nominal_duration.as_millis() as u64,
            "recording complete"
        );
        Ok(EncodedOutput {
            bytes: buf.freeze(),
            mime_type,
            nominal_duration,
            frame_count: self.frames,
        })
    }

    /// Stop recording and discard partial output. No-op once terminal.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.fail();
    }

    fn fail(&mut self) {
        if let Some(rec) = self.recorder.take() {
            rec.abort();
        }
        self.chunks.clear();
        self.state = EncoderState::Failed;
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
