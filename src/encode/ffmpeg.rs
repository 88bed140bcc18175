use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::audio::decode::f32le_bytes;
use crate::encode::format::{CodecKind, MimeType, codec_kind};
use crate::encode::runtime::{MediaRecorder, MediaRuntime, RecorderKill, RecorderSpec};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u16;
use crate::foundation::temp::{TempFileGuard, temp_path};
use crate::render::frame::FrameRGBA;
use crate::stream::track::AudioSpec;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Muxer and encoder names a local ffmpeg build reports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FfmpegCaps {
    pub(crate) muxers: HashSet<String>,
    pub(crate) encoders: HashSet<String>,
}

impl FfmpegCaps {
    fn probe() -> ReelResult<Self> {
        Ok(Self {
            muxers: parse_capability_list(&run_listing("-muxers")?),
            encoders: parse_capability_list(&run_listing("-encoders")?),
        })
    }
}

fn run_listing(flag: &str) -> ReelResult<String> {
    let out = Command::new("ffmpeg")
        .args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            ReelError::encoder_unsupported(format!(
                "failed to run ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
    if !out.status.success() {
        return Err(ReelError::encoder_unsupported(format!(
            "ffmpeg {flag} exited with status {}",
            out.status
        )));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Parse `ffmpeg -muxers` / `ffmpeg -encoders` output: a legend, a `--` separator line, then
/// one `FLAGS name[,alias] description` row per entry.
pub(crate) fn parse_capability_list(listing: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut in_table = false;
    for line in listing.lines() {
        let trimmed = line.trim();
        if !in_table {
            in_table = trimmed.starts_with("--");
            continue;
        }
        let mut cols = trimmed.split_whitespace();
        let (Some(_flags), Some(name)) = (cols.next(), cols.next()) else {
            continue;
        };
        names.extend(name.split(',').filter(|n| !n.is_empty()).map(str::to_owned));
    }
    names
}

/// Concrete ffmpeg settings for one mime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FfmpegTarget {
    pub(crate) muxer: &'static str,
    pub(crate) video_encoder: &'static str,
    pub(crate) audio_encoder: Option<&'static str>,
}

fn muxer_for(essence: &str) -> Option<&'static str> {
    match essence {
        "video/webm" => Some("webm"),
        "video/mp4" => Some("mp4"),
        "video/x-matroska" | "video/matroska" => Some("matroska"),
        _ => None,
    }
}

fn default_codecs(muxer: &str, kind: CodecKind) -> &'static [&'static str] {
    match (muxer, kind) {
        ("webm", CodecKind::Video) => &["vp9", "vp8", "av01"],
        ("webm", CodecKind::Audio) => &["opus", "vorbis"],
        ("mp4", CodecKind::Video) => &["avc1", "hev1", "av01"],
        ("mp4", CodecKind::Audio) => &["mp4a", "opus"],
        ("matroska", CodecKind::Video) => &["avc1", "vp9", "vp8"],
        ("matroska", CodecKind::Audio) => &["opus", "mp4a", "vorbis"],
        _ => &[],
    }
}

fn encoders_for(codec: &str) -> &'static [&'static str] {
    let c = codec.to_ascii_lowercase();
    match c.split('.').next().unwrap_or("") {
        "vp8" => &["libvpx"],
        "vp9" | "vp09" => &["libvpx-vp9"],
        "avc1" | "avc3" | "h264" => &["libx264", "libopenh264"],
        "hev1" | "hvc1" | "h265" => &["libx265"],
        "av01" | "av1" => &["libsvtav1", "libaom-av1"],
        "opus" => &["libopus", "opus"],
        "vorbis" => &["libvorbis"],
        "mp4a" | "aac" => &["aac"],
        "flac" => &["flac"],
        _ => &[],
    }
}

fn pick_encoder(caps: &FfmpegCaps, codecs: &[&str]) -> Option<&'static str> {
    codecs
        .iter()
        .flat_map(|c| encoders_for(c).iter().copied())
        .find(|e| caps.encoders.contains(*e))
}

/// Map a mime type onto this ffmpeg build. Codecs named in the mime must all be encodable;
/// unnamed ones fall back to the container's usual codecs.
pub(crate) fn resolve_target(
    mime: &MimeType,
    caps: &FfmpegCaps,
    with_audio: bool,
) -> Option<FfmpegTarget> {
    let muxer = muxer_for(mime.essence())?;
    if !caps.muxers.contains(muxer) {
        return None;
    }
    if mime
        .codecs()
        .iter()
        .any(|c| codec_kind(c) == CodecKind::Unknown || pick_encoder(caps, &[c.as_str()]).is_none())
    {
        return None;
    }

    let named_video: Vec<&str> = mime.video_codecs().collect();
    let video_encoder = if named_video.is_empty() {
        pick_encoder(caps, default_codecs(muxer, CodecKind::Video))?
    } else {
        pick_encoder(caps, &named_video)?
    };

    let named_audio: Vec<&str> = mime.audio_codecs().collect();
    let audio_encoder = if !with_audio {
        None
    } else if named_audio.is_empty() {
        Some(pick_encoder(caps, default_codecs(muxer, CodecKind::Audio))?)
    } else {
        Some(pick_encoder(caps, &named_audio)?)
    };

    Some(FfmpegTarget {
        muxer,
        video_encoder,
        audio_encoder,
    })
}

fn video_encoder_args(encoder: &str) -> &'static [&'static str] {
    match encoder {
        "libvpx" | "libvpx-vp9" => &["-deadline", "realtime", "-cpu-used", "8", "-b:v", "4M"],
        "libx264" => &["-preset", "veryfast"],
        "libx265" => &["-preset", "veryfast"],
        "libsvtav1" => &["-preset", "10"],
        "libaom-av1" => &["-cpu-used", "8"],
        _ => &[],
    }
}

fn muxer_args(muxer: &str) -> &'static [&'static str] {
    match muxer {
        // A pipe cannot seek back to write the moov atom.
        "mp4" => &["-movflags", "frag_keyframe+empty_moov+default_base_moof"],
        _ => &[],
    }
}

/// Records through the system `ffmpeg` binary.
#[derive(Debug)]
pub struct FfmpegRuntime {
    caps: FfmpegCaps,
}

impl FfmpegRuntime {
    /// Probe the local ffmpeg once for muxers and encoders.
    pub fn probe() -> ReelResult<Self> {
        let caps = FfmpegCaps::probe()?;
        tracing::debug!(
            muxers = caps.muxers.len(),
            encoders = caps.encoders.len(),
            "ffmpeg capabilities probed"
        );
        Ok(Self { caps })
    }

    pub(crate) fn from_caps(caps: FfmpegCaps) -> Self {
        Self { caps }
    }
}

impl MediaRuntime for FfmpegRuntime {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_type_supported(&self, mime: &MimeType) -> bool {
        let with_audio = mime.audio_codecs().next().is_some();
        resolve_target(mime, &self.caps, with_audio).is_some()
    }

    fn default_format(&self) -> Option<MimeType> {
        ["video/x-matroska", "video/webm", "video/mp4"]
            .into_iter()
            .filter_map(|m| MimeType::parse(m).ok())
            .find(|m| resolve_target(m, &self.caps, false).is_some())
    }

    fn create_recorder(&self, spec: &RecorderSpec) -> ReelResult<Box<dyn MediaRecorder>> {
        let target = resolve_target(&spec.mime, &self.caps, spec.audio.is_some()).ok_or_else(
            || {
                ReelError::encoder_unsupported(format!(
                    "ffmpeg cannot record '{}'{}",
                    spec.mime,
                    if spec.audio.is_some() { " with audio" } else { "" }
                ))
            },
        )?;
        Ok(Box::new(FfmpegRecorder::spawn(spec, target)?))
    }
}

/// The ffmpeg process a recorder currently waits on, shared with its kill handle.
///
/// Nobody holds the lock across a blocking wait: `wait` is only called once the process's
/// output pipes have closed.
#[derive(Debug, Default)]
struct ChildSlot {
    child: Option<Child>,
    killed: bool,
}

impl ChildSlot {
    fn kill(&mut self) {
        self.killed = true;
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
    }

    fn wait(&mut self) -> ReelResult<ExitStatus> {
        if self.killed {
            return Err(ReelError::Cancelled);
        }
        let Some(child) = self.child.as_mut() else {
            return Err(ReelError::encode("no ffmpeg process to wait for"));
        };
        child
            .wait()
            .map_err(|e| ReelError::encode(format!("failed to wait for ffmpeg to finish: {e}")))
    }
}

fn lock_slot(slot: &Mutex<ChildSlot>) -> MutexGuard<'_, ChildSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_stderr(stderr: Option<ChildStderr>) -> Option<JoinHandle<Vec<u8>>> {
    stderr.map(|mut s| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_stderr(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

struct AudioSpool {
    spec: AudioSpec,
    writer: BufWriter<File>,
    guard: TempFileGuard,
}

struct FfmpegRecorder {
    target: FfmpegTarget,
    width: u32,
    height: u32,
    bg_rgba: [u8; 4],
    child: Arc<Mutex<ChildSlot>>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    stdout: Option<JoinHandle<()>>,
    chunks: mpsc::Receiver<Bytes>,
    scratch: Vec<u8>,
    // Only set for recordings with audio: first pass goes to this file.
    video_file: Option<TempFileGuard>,
    audio: Option<AudioSpool>,
}

impl FfmpegRecorder {
    fn spawn(spec: &RecorderSpec, target: FfmpegTarget) -> ReelResult<Self> {
        let (width, height) = (spec.canvas.width, spec.canvas.height);
        let (video_file, audio) = match spec.audio {
            Some(a) => {
                let video = temp_path("video", "mkv");
                let pcm = temp_path("audio", "f32le");
                let file = File::create(&pcm).map_err(|e| {
                    ReelError::encode(format!("create audio spool '{}': {e}", pcm.display()))
                })?;
                (
                    Some(TempFileGuard::new(video)),
                    Some(AudioSpool {
                        spec: a,
                        writer: BufWriter::new(file),
                        guard: TempFileGuard::new(pcm),
                    }),
                )
            }
            None => (None, None),
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped()).stderr(Stdio::piped());
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &format!("{}/{}", spec.fps.num, spec.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            target.video_encoder,
            "-pix_fmt",
            "yuv420p",
        ])
        .args(video_encoder_args(target.video_encoder));

        match video_file.as_ref().and_then(|g| g.0.as_ref()) {
            Some(path) => {
                cmd.stdout(Stdio::null()).args(["-f", "matroska"]).arg(path);
            }
            None => {
                cmd.stdout(Stdio::piped())
                    .args(["-f", target.muxer])
                    .args(muxer_args(target.muxer))
                    .arg("pipe:1");
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let stderr = read_stderr(child.stderr.take());

        let (tx, rx) = mpsc::channel();
        let stdout = child.stdout.take().map(|out| {
            let interval = spec.chunk_interval;
            std::thread::spawn(move || read_chunks(out, interval, tx))
        });

        tracing::debug!(
            muxer = target.muxer,
            video = target.video_encoder,
            audio = target.audio_encoder.unwrap_or("none"),
            "ffmpeg recorder spawned"
        );
        Ok(Self {
            target,
            width,
            height,
            bg_rgba: spec.background_rgba,
            child: Arc::new(Mutex::new(ChildSlot {
                child: Some(child),
                killed: false,
            })),
            stdin: Some(stdin),
            stderr,
            stdout,
            chunks: rx,
            scratch: vec![0u8; (width as usize) * (height as usize) * 4],
            video_file,
            audio,
        })
    }

    fn wait_first_pass(&mut self) -> ReelResult<Vec<Bytes>> {
        drop(self.stdin.take());
        if let Some(h) = self.stdout.take() {
            let _ = h.join();
        }
        // stderr closes when ffmpeg exits or is killed.
        let stderr = join_stderr(self.stderr.take());
        let status = lock_slot(&self.child).wait()?;
        if !status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(self.chunks.try_iter().collect())
    }

    fn mux_audio(&mut self, video: &Path) -> ReelResult<Vec<Bytes>> {
        let Some(mut spool) = self.audio.take() else {
            return Err(ReelError::encode("no audio spool to mux"));
        };
        spool
            .writer
            .flush()
            .map_err(|e| ReelError::encode(format!("flush audio spool: {e}")))?;
        let Some(pcm_path) = spool.guard.0.clone() else {
            return Err(ReelError::encode("audio spool path missing"));
        };
        let Some(audio_encoder) = self.target.audio_encoder else {
            return Err(ReelError::encode("no audio encoder resolved"));
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video)
            .args([
                "-f",
                "f32le",
                "-ar",
                &spool.spec.sample_rate.to_string(),
                "-ac",
                &spool.spec.channels.to_string(),
                "-i",
            ])
            .arg(&pcm_path)
            .args([
                "-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", audio_encoder,
                "-shortest", "-f",
            ])
            .arg(self.target.muxer)
            .args(muxer_args(self.target.muxer))
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let (stdout, stderr) = {
            let mut slot = lock_slot(&self.child);
            if slot.killed {
                return Err(ReelError::Cancelled);
            }
            // The first pass has already been waited for; reap it before reusing the slot.
            if let Some(mut first) = slot.child.take() {
                let _ = first.wait();
            }
            let mut child = cmd
                .spawn()
                .map_err(|e| ReelError::encode(format!("failed to run ffmpeg audio mux: {e}")))?;
            let io = (child.stdout.take(), child.stderr.take());
            slot.child = Some(child);
            io
        };
        let stderr = read_stderr(stderr);
        let mut muxed = Vec::new();
        if let Some(mut out) = stdout {
            out.read_to_end(&mut muxed)
                .map_err(|e| ReelError::encode(format!("read ffmpeg audio mux output: {e}")))?;
        }
        let stderr = join_stderr(stderr);
        let status = lock_slot(&self.child).wait()?;
        if !status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg audio mux exited with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(vec![Bytes::from(muxed)])
    }
}

fn read_chunks(mut out: impl std::io::Read, interval: Duration, tx: mpsc::Sender<Bytes>) {
    let mut buf = vec![0u8; 64 * 1024];
    let mut pending = Vec::new();
    let mut last_flush = Instant::now();
    loop {
        match out.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
        if last_flush.elapsed() >= interval {
            last_flush = Instant::now();
            if tx.send(Bytes::from(std::mem::take(&mut pending))).is_err() {
                return;
            }
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(Bytes::from(pending));
    }
}

impl MediaRecorder for FfmpegRecorder {
    fn write_video(&mut self, _index: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.bg_rgba,
        )?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::encode("ffmpeg recorder is already finalized"));
        };
        stdin
            .write_all(&self.scratch)
            .map_err(|e| ReelError::encode(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    fn write_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        let Some(spool) = self.audio.as_mut() else {
            return Ok(());
        };
        spool
            .writer
            .write_all(&f32le_bytes(samples))
            .map_err(|e| ReelError::encode(format!("write audio spool: {e}")))
    }

    fn poll_chunks(&mut self) -> ReelResult<Vec<Bytes>> {
        Ok(self.chunks.try_iter().collect())
    }

    fn finish(mut self: Box<Self>) -> ReelResult<Vec<Bytes>> {
        let mut chunks = self.wait_first_pass()?;
        let video: Option<PathBuf> = self.video_file.as_ref().and_then(|g| g.0.clone());
        if let Some(video) = video {
            chunks.extend(self.mux_audio(&video)?);
        }
        Ok(chunks)
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        lock_slot(&self.child).kill();
        if let Some(h) = self.stdout.take() {
            let _ = h.join();
        }
        if let Some(h) = self.stderr.take() {
            let _ = h.join();
        }
        tracing::debug!("ffmpeg recorder aborted");
    }

    fn kill_handle(&self) -> RecorderKill {
        let slot = Arc::clone(&self.child);
        RecorderKill::new(move || lock_slot(&slot).kill())
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        // Never leave ffmpeg running; a process that already exited is just reaped.
        drop(self.stdin.take());
        if let Some(mut child) = lock_slot(&self.child).child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        let (r, g, b) = if src_is_premul {
            (
                u16::from(s[0]) + mul_div255_u16(bg_r, inv),
                u16::from(s[1]) + mul_div255_u16(bg_g, inv),
                u16::from(s[2]) + mul_div255_u16(bg_b, inv),
            )
        } else {
            (
                mul_div255_u16(u16::from(s[0]), a) + mul_div255_u16(bg_r, inv),
                mul_div255_u16(u16::from(s[1]), a) + mul_div255_u16(bg_g, inv),
                mul_div255_u16(u16::from(s[2]), a) + mul_div255_u16(bg_b, inv),
            )
        };
        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
