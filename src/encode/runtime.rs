use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use crate::encode::format::MimeType;
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::Fnv1a64;
use crate::render::frame::FrameRGBA;
use crate::stream::track::AudioSpec;

/// Parameters for one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct RecorderSpec {
    /// Container/codecs the output must use.
    pub mime: MimeType,
    pub canvas: Canvas,
    pub fps: Fps,
    /// `None` for a video-only recording.
    pub audio: Option<AudioSpec>,
    /// How often buffered output is cut into a chunk.
    pub chunk_interval: Duration,
    /// Colour under transparent pixels.
    pub background_rgba: [u8; 4],
}

/// An encoding environment: capability probing plus recorder creation.
pub trait MediaRuntime: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn is_type_supported(&self, mime: &MimeType) -> bool;

    /// What the runtime records when asked for no particular format, if anything.
    fn default_format(&self) -> Option<MimeType>;

    fn create_recorder(&self, spec: &RecorderSpec) -> ReelResult<Box<dyn MediaRecorder>>;
}

/// A live recording.
///
/// Chunks come out in the order they must be concatenated.
pub trait MediaRecorder: Send {
    fn write_video(&mut self, index: FrameIndex, frame: &FrameRGBA) -> ReelResult<()>;

    /// Interleaved samples in the recording's [`AudioSpec`].
    fn write_audio(&mut self, samples: &[f32]) -> ReelResult<()>;

    /// Chunks completed since the last poll.
    fn poll_chunks(&mut self) -> ReelResult<Vec<Bytes>>;

    /// End of input. Returns once no more chunks will arrive, with every chunk not yet polled.
    fn finish(self: Box<Self>) -> ReelResult<Vec<Bytes>>;

    /// Stop immediately and discard output.
    fn abort(self: Box<Self>);

    /// Handle that stops this recording from another thread, including while `finish` runs.
    fn kill_handle(&self) -> RecorderKill;
}

/// Stops a live recording without going through its owner.
///
/// Killing is idempotent. A killed recording fails its next write, and a pending `finish`
/// returns early with an error.
#[derive(Clone)]
pub struct RecorderKill(Arc<dyn Fn() + Send + Sync>);

impl RecorderKill {
    pub fn new(kill: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(kill))
    }

    pub fn kill(&self) {
        (self.0)()
    }
}

impl fmt::Debug for RecorderKill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecorderKill")
    }
}

/// Everything an [`InMemoryRuntime`] saw.
#[derive(Clone, Debug, Default)]
pub struct RecorderLog {
    pub recorders_created: usize,
    pub last_spec: Option<RecorderSpec>,
    /// Video slots written, in order.
    pub video_frames: Vec<FrameIndex>,
    /// All audio samples written, concatenated.
    pub audio: Vec<f32>,
    /// Whether the first write of the latest recording was audio.
    pub first_write_was_audio: Option<bool>,
    pub finished: usize,
    pub aborted: usize,
}

/// Deterministic runtime that records into memory.
///
/// The byte stream is a header chunk followed by one small record per write, cut into chunks
/// every `chunk_interval` of video time.
#[derive(Clone, Debug)]
pub struct InMemoryRuntime {
    supported: Vec<MimeType>,
    default: Option<MimeType>,
    fail_after_frames: Option<u64>,
    stall_finish: bool,
    log: Arc<Mutex<RecorderLog>>,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::with_supported(&["video/webm;codecs=vp9,opus", "video/webm;codecs=vp8,opus"])
            .with_default(Some("video/webm"))
    }
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime that supports exactly `formats` and has no default.
    pub fn with_supported(formats: &[&str]) -> Self {
        Self {
            supported: formats
                .iter()
                .filter_map(|f| MimeType::parse(f).ok())
                .collect(),
            default: None,
            fail_after_frames: None,
            stall_finish: false,
            log: Arc::new(Mutex::new(RecorderLog::default())),
        }
    }

    pub fn with_default(mut self, default: Option<&str>) -> Self {
        self.default = default.and_then(|d| MimeType::parse(d).ok());
        self
    }

    /// Make recorders fail on the video write after `frames` frames.
    pub fn failing_after(mut self, frames: u64) -> Self {
        self.fail_after_frames = Some(frames);
        self
    }

    /// Make `finish` block until the recorder is killed, like an encoder stuck on its last pass.
    pub fn stalling_finish(mut self) -> Self {
        self.stall_finish = true;
        self
    }

    pub fn log(&self) -> RecorderLog {
        lock(&self.log).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MediaRuntime for InMemoryRuntime {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn is_type_supported(&self, mime: &MimeType) -> bool {
        self.supported.iter().any(|s| {
            s.essence() == mime.essence() && mime.codecs().iter().all(|c| s.codecs().contains(c))
        })
    }

    fn default_format(&self) -> Option<MimeType> {
        self.default.clone()
    }

    fn create_recorder(&self, spec: &RecorderSpec) -> ReelResult<Box<dyn MediaRecorder>> {
        let supported = self.is_type_supported(&spec.mime)
            || self
                .default
                .as_ref()
                .is_some_and(|d| d.essence() == spec.mime.essence());
        if !supported {
            return Err(ReelError::encoder_unsupported(format!(
                "in-memory runtime cannot record '{}'",
                spec.mime
            )));
        }

        let mut header = b"SLRL".to_vec();
        header.extend_from_slice(spec.mime.to_string().as_bytes());
        header.push(b'\n');

        {
            let mut log = lock(&self.log);
            log.recorders_created += 1;
            log.last_spec = Some(spec.clone());
            log.first_write_was_audio = None;
        }
        Ok(Box::new(InMemoryRecorder {
            fps: spec.fps,
            frames_per_chunk: frames_per_chunk(spec.fps, spec.chunk_interval),
            ready: vec![Bytes::from(header)],
            pending: Vec::new(),
            frames_in_pending: 0,
            frames_written: 0,
            fail_after_frames: self.fail_after_frames,
            stall_finish: self.stall_finish,
            killed: Arc::new((Mutex::new(false), Condvar::new())),
            log: Arc::clone(&self.log),
        }))
    }
}

fn frames_per_chunk(fps: Fps, interval: Duration) -> u64 {
    fps.frames_to_cover(interval).max(1)
}

struct InMemoryRecorder {
    fps: Fps,
    frames_per_chunk: u64,
    ready: Vec<Bytes>,
    pending: Vec<u8>,
    frames_in_pending: u64,
    frames_written: u64,
    fail_after_frames: Option<u64>,
    stall_finish: bool,
    killed: Arc<(Mutex<bool>, Condvar)>,
    log: Arc<Mutex<RecorderLog>>,
}

impl InMemoryRecorder {
    fn is_killed(&self) -> bool {
        *lock(&self.killed.0)
    }

    fn cut_chunk(&mut self) {
        if !self.pending.is_empty() {
            self.ready.push(Bytes::from(std::mem::take(&mut self.pending)));
        }
        self.frames_in_pending = 0;
    }
}

impl MediaRecorder for InMemoryRecorder {
    fn write_video(&mut self, index: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        if self.is_killed() {
            return Err(ReelError::encode("in-memory recorder was killed"));
        }
        if self
            .fail_after_frames
            .is_some_and(|n| self.frames_written >= n)
        {
            return Err(ReelError::encode("in-memory recorder: injected stream error"));
        }
        let mut h = Fnv1a64::new_default();
        h.write_u64(u64::from(frame.width));
        h.write_u64(u64::from(frame.height));
        h.write_bytes(&frame.data);

        self.pending.push(b'V');
        self.pending.extend_from_slice(&index.0.to_le_bytes());
        self.pending.extend_from_slice(&h.finish().to_le_bytes());
        self.frames_written += 1;
        self.frames_in_pending += 1;
        {
            let mut log = lock(&self.log);
            log.video_frames.push(index);
            log.first_write_was_audio.get_or_insert(false);
        }
        if self.frames_in_pending >= self.frames_per_chunk {
            self.cut_chunk();
        }
        Ok(())
    }

    fn write_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        self.pending.push(b'A');
        self.pending
            .extend_from_slice(&(samples.len() as u32).to_le_bytes());
        let mut log = lock(&self.log);
        log.audio.extend_from_slice(samples);
        log.first_write_was_audio.get_or_insert(true);
        Ok(())
    }

    fn poll_chunks(&mut self) -> ReelResult<Vec<Bytes>> {
        Ok(std::mem::take(&mut self.ready))
    }

    fn finish(mut self: Box<Self>) -> ReelResult<Vec<Bytes>> {
        if self.stall_finish {
            let (flag, cvar) = &*self.killed;
            let mut killed = lock(flag);
            while !*killed {
                killed = cvar
                    .wait(killed)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        }
        if self.is_killed() {
            lock(&self.log).aborted += 1;
            return Err(ReelError::encode("in-memory recorder was killed during finish"));
        }
        self.cut_chunk();
        tracing::debug!(
            frames = self.frames_written,
            fps = self.fps.as_f64(),
            "in-memory recording finished"
        );
        lock(&self.log).finished += 1;
        Ok(std::mem::take(&mut self.ready))
    }

    fn abort(self: Box<Self>) {
        lock(&self.log).aborted += 1;
    }

    fn kill_handle(&self) -> RecorderKill {
        let killed = Arc::clone(&self.killed);
        RecorderKill::new(move || {
            let (flag, cvar) = &*killed;
            *lock(flag) = true;
            cvar.notify_all();
        })
    }
}
