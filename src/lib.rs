//! Slidereel turns an ordered list of photos plus one music track into a single encoded video.
//!
//! A [`Studio`] owns the one active [`RenderSession`](session::render_session) at a time:
//!
//! - Photos are fetched as raw bytes and decoded locally ([`AssetLoader`]).
//! - The music track is decoded and looped through an audio graph ([`AudioGraphBuilder`]).
//! - A [`Compositor`] draws one photo per tick with a slow zoom onto a CPU raster surface.
//! - Video and audio captures are combined and recorded by an [`Encoder`] in the format picked by
//!   the [`CodecNegotiator`].
//!
//! Recording runs against a [`MediaRuntime`]: [`FfmpegRuntime`] drives the system `ffmpeg`,
//! [`InMemoryRuntime`] records deterministically in memory.
#![forbid(unsafe_code)]

mod foundation;

pub mod assets;
pub mod audio;
/// Session configuration.
pub mod config;
pub mod encode;
pub mod render;
pub mod session;
pub mod stream;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::assets::loader::{AssetLoader, ImageAsset, LoadReport};
pub use crate::assets::source::{FetchError, Fetcher, SourceRef};
pub use crate::audio::decode::{AudioPcm, FfmpegPcmDecoder, PcmDecoder, RawF32Decoder};
pub use crate::audio::graph::{AudioGraph, AudioGraphBuilder, AudioTrack, NullPreview, PreviewSink};
pub use crate::config::{AudioPreview, ClockMode, FetchConfig, SessionConfig};
pub use crate::encode::encoder::{EncodedOutput, Encoder, EncoderState};
pub use crate::encode::ffmpeg::FfmpegRuntime;
pub use crate::encode::format::{ChosenFormat, CodecNegotiator, MimeType};
pub use crate::encode::runtime::{
    InMemoryRuntime, MediaRecorder, MediaRuntime, RecorderKill, RecorderLog,
};
pub use crate::render::compositor::Compositor;
pub use crate::render::frame::FrameRGBA;
pub use crate::session::render_session::{RenderRequest, SessionNotice};
pub use crate::session::resources::{LedgerSnapshot, ResourceLedger};
pub use crate::session::state::SessionState;
pub use crate::session::studio::{SessionHandle, SessionTicket, Studio};
