//! Capture tracks and the combined stream fed to the encoder.

/// Video capture of the rendering surface.
pub mod capture;
/// Stream multiplexing.
pub mod multiplex;
/// Live track handles.
pub mod track;
