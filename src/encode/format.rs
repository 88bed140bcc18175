use std::fmt;
use std::str::FromStr;

use crate::encode::runtime::MediaRuntime;
use crate::foundation::error::{ReelError, ReelResult};

/// What a codec id in a mime `codecs=` list encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    Video,
    Audio,
    Unknown,
}

/// Classify a codec id such as `vp9`, `avc1.42E01E` or `opus`.
pub fn codec_kind(codec: &str) -> CodecKind {
    let c = codec.trim().to_ascii_lowercase();
    let family = c.split('.').next().unwrap_or("");
    match family {
        "vp8" | "vp9" | "vp09" | "avc1" | "avc3" | "h264" | "hev1" | "hvc1" | "h265" | "av01"
        | "av1" => CodecKind::Video,
        "opus" | "vorbis" | "mp4a" | "aac" | "flac" | "pcm" => CodecKind::Audio,
        _ => CodecKind::Unknown,
    }
}

/// A container mime type with an optional codec list, e.g. `video/webm;codecs=vp9,opus`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MimeType {
    essence: String,
    codecs: Vec<String>,
}

impl MimeType {
    pub fn parse(s: &str) -> ReelResult<Self> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let Some((kind, sub)) = essence.split_once('/') else {
            return Err(ReelError::validation(format!("invalid mime type '{s}'")));
        };
        if kind.is_empty() || sub.is_empty() {
            return Err(ReelError::validation(format!("invalid mime type '{s}'")));
        }

        let mut codecs = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("codecs") {
                continue;
            }
            codecs.extend(
                value
                    .trim()
                    .trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty()),
            );
        }
        Ok(Self { essence, codecs })
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    pub fn video_codecs(&self) -> impl Iterator<Item = &str> {
        self.codecs
            .iter()
            .map(String::as_str)
            .filter(|c| codec_kind(c) == CodecKind::Video)
    }

    pub fn audio_codecs(&self) -> impl Iterator<Item = &str> {
        self.codecs
            .iter()
            .map(String::as_str)
            .filter(|c| codec_kind(c) == CodecKind::Audio)
    }

    /// Same container with every audio codec removed.
    pub fn without_audio(&self) -> Self {
        Self {
            essence: self.essence.clone(),
            codecs: self
                .codecs
                .iter()
                .filter(|c| codec_kind(c) != CodecKind::Audio)
                .cloned()
                .collect(),
        }
    }
}

impl FromStr for MimeType {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        if !self.codecs.is_empty() {
            write!(f, ";codecs={}", self.codecs.join(","))?;
        }
        Ok(())
    }
}

/// Encoding target picked by [`CodecNegotiator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChosenFormat {
    /// First entry of the preference list the runtime supports.
    Preferred(MimeType),
    /// Nothing in the list was supported; the runtime's own default.
    RuntimeDefault(MimeType),
}

impl ChosenFormat {
    pub fn mime(&self) -> &MimeType {
        match self {
            Self::Preferred(m) | Self::RuntimeDefault(m) => m,
        }
    }

    pub fn is_runtime_default(&self) -> bool {
        matches!(self, Self::RuntimeDefault(_))
    }

    /// Mime the artifact will carry. Audio codecs are dropped for video-only streams.
    pub fn effective_mime(&self, has_audio: bool) -> MimeType {
        if has_audio {
            self.mime().clone()
        } else {
            self.mime().without_audio()
        }
    }
}

impl fmt::Display for ChosenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preferred(m) => write!(f, "{m}"),
            Self::RuntimeDefault(m) => write!(f, "{m} (runtime default)"),
        }
    }
}

/// Picks the encoding target from an ordered preference list. All capability detection lives
/// here, so the encoder never branches on codec names.
pub struct CodecNegotiator<'a> {
    runtime: &'a dyn MediaRuntime,
}

impl<'a> CodecNegotiator<'a> {
    pub fn new(runtime: &'a dyn MediaRuntime) -> Self {
        Self { runtime }
    }

    /// First supported entry, else the runtime default, else [`ReelError::EncoderUnsupported`].
    ///
    /// Entries that do not parse as mime types are skipped.
    pub fn negotiate(&self, preferences: &[String]) -> ReelResult<ChosenFormat> {
        for pref in preferences {
            let mime = match MimeType::parse(pref) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(preference = %pref, error = %e, "skipping preference");
                    continue;
                }
            };
            if self.runtime.is_type_supported(&mime) {
                tracing::debug!(format = %mime, runtime = self.runtime.name(), "format negotiated");
                return Ok(ChosenFormat::Preferred(mime));
            }
            tracing::debug!(format = %mime, "format not supported");
        }

        match self.runtime.default_format() {
            Some(mime) => {
                tracing::info!(format = %mime, "no preferred format supported; using runtime default");
                Ok(ChosenFormat::RuntimeDefault(mime))
            }
            None => Err(ReelError::encoder_unsupported(format!(
                "runtime '{}' supports none of [{}] and has no default format",
                self.runtime.name(),
                preferences.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/format.rs"]
mod tests;
