//! Rendering surface, frame clock and the compositor that drives them.

pub(crate) mod clock;
/// Per-tick photo selection, zoom and drawing.
pub mod compositor;
/// Rendered frame type.
pub mod frame;
pub(crate) mod surface;
