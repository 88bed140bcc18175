//! Audio decode, the looping routing graph and the live preview.

/// PCM decoding.
pub mod decode;
/// Routing graph.
pub mod graph;
/// Audible preview destinations.
pub mod preview;
