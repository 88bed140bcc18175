use std::fmt;
use std::process::Command;
use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::temp::{TempFileGuard, temp_path};

/// Rate every track is decoded to before it enters the graph.
pub const MIX_SAMPLE_RATE: u32 = 48_000;
/// Channel count every track is decoded to.
pub const MIX_CHANNELS: u16 = 2;

/// Decoded interleaved PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Interleaved `f32` samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Turns encoded audio bytes into [`AudioPcm`] at [`MIX_SAMPLE_RATE`] / [`MIX_CHANNELS`].
pub trait PcmDecoder: Send + Sync + fmt::Debug {
    fn decode(&self, bytes: &[u8]) -> ReelResult<AudioPcm>;
}

/// Decodes any format the system `ffmpeg` understands.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegPcmDecoder;

impl PcmDecoder for FfmpegPcmDecoder {
    fn decode(&self, bytes: &[u8]) -> ReelResult<AudioPcm> {
        let path = temp_path("audio_src", "bin");
        let _guard = TempFileGuard::new(path.clone());
        std::fs::write(&path, bytes)
            .map_err(|e| ReelError::audio_setup(format!("spool audio bytes: {e}")))?;

        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args([
                "-vn",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "-ac",
                &MIX_CHANNELS.to_string(),
                "-ar",
                &MIX_SAMPLE_RATE.to_string(),
                "pipe:1",
            ])
            .output()
            .map_err(|e| {
                ReelError::audio_setup(format!("failed to run ffmpeg for audio decode: {e}"))
            })?;

        if !out.status.success() {
            let msg = String::from_utf8_lossy(&out.stderr);
            return Err(ReelError::audio_setup(format!(
                "ffmpeg audio decode failed: {}",
                msg.trim()
            )));
        }
        parse_f32le(&out.stdout)
    }
}

/// Treats the bytes as interleaved stereo `f32le` at the mix rate. Used for pre-decoded audio.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawF32Decoder;

impl PcmDecoder for RawF32Decoder {
    fn decode(&self, bytes: &[u8]) -> ReelResult<AudioPcm> {
        parse_f32le(bytes)
    }
}

fn parse_f32le(bytes: &[u8]) -> ReelResult<AudioPcm> {
    if !bytes.len().is_multiple_of(4) {
        return Err(ReelError::audio_setup(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    // Drop a dangling half frame.
    let whole = pcm.len() - pcm.len() % usize::from(MIX_CHANNELS);
    pcm.truncate(whole);
    Ok(AudioPcm {
        sample_rate: MIX_SAMPLE_RATE,
        channels: MIX_CHANNELS,
        interleaved_f32: pcm,
    })
}

/// Encode interleaved samples as raw `f32le` bytes.
pub(crate) fn f32le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
