//! Format negotiation, recording runtimes and the encoder lifecycle.

/// Encoder state machine and artifact assembly.
pub mod encoder;
/// System `ffmpeg` runtime.
pub mod ffmpeg;
/// Mime types and codec negotiation.
pub mod format;
/// Runtime and recorder traits, plus the in-memory runtime.
pub mod runtime;
