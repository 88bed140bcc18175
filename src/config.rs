use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};

/// Preference list used when the caller does not configure one, most preferred first.
pub const DEFAULT_CODEC_PREFERENCES: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4;codecs=avc1,mp4a",
    "video/mp4",
];

/// How the compositor clock advances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Tick at the target frame rate against the wall clock.
    #[default]
    Realtime,
    /// Tick as fast as possible; tick `k` is stamped with exactly `k` frame intervals.
    Offline,
}

/// Where the live audio preview goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPreview {
    /// Discard the preview signal.
    Disabled,
    /// Play through a system `ffplay` process.
    #[default]
    Ffplay,
}

/// Network settings for image and audio retrieval.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Intermediary endpoint tried once when a direct fetch is refused.
    pub proxy_endpoint: Option<String>,
    /// Query parameter carrying the original URL on the proxy request.
    pub proxy_query_param: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: concat!("slidereel/", env!("CARGO_PKG_VERSION")).to_owned(),
            proxy_endpoint: Some("https://corsproxy.io/".to_owned()),
            proxy_query_param: "url".to_owned(),
        }
    }
}

/// Everything a render session is parameterised by.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Output canvas.
    pub canvas: Canvas,
    /// Capture frame rate.
    pub fps: Fps,
    /// How long each photo stays on screen.
    pub per_image_duration_ms: u64,
    /// Extra scale reached at the end of each photo (`0.1` = 10% zoom-in).
    pub zoom_amount: f64,
    /// Clear colour behind each photo (straight RGBA8).
    pub background_rgba: [u8; 4],
    /// Container/codec mime strings, most preferred first.
    pub codec_preferences: Vec<String>,
    /// Recorder chunk flush interval in milliseconds.
    pub chunk_interval_ms: u64,
    /// Photos larger than this on either side are downscaled on load.
    pub max_decode_dimension: u32,
    /// Share of the progress bar reserved for the loading phase (0..=100).
    pub loading_progress_allowance: u8,
    /// Clock mode.
    pub clock: ClockMode,
    /// Live preview destination.
    pub audio_preview: AudioPreview,
    /// Network settings.
    pub fetch: FetchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            fps: Fps { num: 30, den: 1 },
            per_image_duration_ms: 3_000,
            zoom_amount: 0.1,
            background_rgba: [18, 20, 28, 255],
            codec_preferences: DEFAULT_CODEC_PREFERENCES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            chunk_interval_ms: 100,
            max_decode_dimension: 4096,
            loading_progress_allowance: 10,
            clock: ClockMode::Realtime,
            audio_preview: AudioPreview::Ffplay,
            fetch: FetchConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read session config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ReelError::validation(format!("invalid session config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ReelResult<()> {
        self.canvas.validate()?;
        Fps::new(self.fps.num, self.fps.den)?;
        if self.per_image_duration_ms == 0 {
            return Err(ReelError::validation(
                "per_image_duration_ms must be non-zero",
            ));
        }
        if !self.zoom_amount.is_finite() || self.zoom_amount < 0.0 {
            return Err(ReelError::validation(
                "zoom_amount must be finite and >= 0",
            ));
        }
        if self.chunk_interval_ms == 0 {
            return Err(ReelError::validation("chunk_interval_ms must be non-zero"));
        }
        if self.max_decode_dimension == 0 {
            return Err(ReelError::validation(
                "max_decode_dimension must be non-zero",
            ));
        }
        if self.loading_progress_allowance > 100 {
            return Err(ReelError::validation(
                "loading_progress_allowance must be <= 100",
            ));
        }
        Ok(())
    }

    pub fn per_image_duration(&self) -> Duration {
        Duration::from_millis(self.per_image_duration_ms)
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    /// Total programme length for `image_count` photos.
    pub fn total_duration(&self, image_count: usize) -> ReelResult<Duration> {
        u32::try_from(image_count)
            .ok()
            .and_then(|n| self.per_image_duration().checked_mul(n))
            .ok_or_else(|| {
                ReelError::validation(format!(
                    "{image_count} images of {} ms overflow the programme length",
                    self.per_image_duration_ms
                ))
            })
    }
}
