use std::io::Write as _;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::audio::decode::{MIX_CHANNELS, MIX_SAMPLE_RATE, f32le_bytes};
use crate::audio::graph::{NullPreview, PreviewSink};
use crate::config::{AudioPreview, ClockMode};
use crate::foundation::error::{ReelError, ReelResult};

pub fn is_ffplay_on_path() -> bool {
    Command::new("ffplay")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Plays the preview through a system `ffplay` process.
///
/// Writes never block the caller: samples are handed to a writer thread that owns the pipe.
pub struct FfplayPreview {
    child: Child,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
}

impl FfplayPreview {
    pub fn spawn() -> ReelResult<Self> {
        let mut child = Command::new("ffplay")
            .args([
                "-nodisp",
                "-autoexit",
                "-loglevel",
                "error",
                "-f",
                "f32le",
                "-ar",
                &MIX_SAMPLE_RATE.to_string(),
                "-ac",
                &MIX_CHANNELS.to_string(),
                "-i",
                "pipe:0",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ReelError::audio_setup(format!("failed to spawn ffplay: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::audio_setup("failed to open ffplay stdin (unexpected)"))?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let writer = std::thread::spawn(move || {
            for buf in rx {
                if stdin.write_all(&buf).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            tx: Some(tx),
            writer: Some(writer),
        })
    }
}

impl PreviewSink for FfplayPreview {
    fn write(&mut self, samples: &[f32]) -> ReelResult<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(ReelError::audio_setup("ffplay preview is closed"));
        };
        tx.send(f32le_bytes(samples))
            .map_err(|_| ReelError::audio_setup("ffplay preview pipe closed"))
    }

    fn close(&mut self) {
        drop(self.tx.take());
        // Playback would otherwise continue until ffplay drains its buffer.
        let _ = self.child.kill();
        if let Some(w) = self.writer.take() {
            let _ = w.join();
        }
        let _ = self.child.wait();
    }
}

impl Drop for FfplayPreview {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pick the preview destination for a session.
///
/// Offline sessions run faster than real time, so they never get an audible preview.
pub fn make_preview(mode: AudioPreview, clock: ClockMode) -> Box<dyn PreviewSink> {
    match (mode, clock) {
        (AudioPreview::Ffplay, ClockMode::Realtime) => {
            if !is_ffplay_on_path() {
                tracing::warn!("ffplay not found on PATH; audio preview disabled");
                return Box::new(NullPreview);
            }
            match FfplayPreview::spawn() {
                Ok(p) => Box::new(p),
                Err(e) => {
                    tracing::warn!(error = %e, "audio preview disabled");
                    Box::new(NullPreview)
                }
            }
        }
        _ => Box::new(NullPreview),
    }
}
