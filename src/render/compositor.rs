use std::time::Duration;

use crate::assets::loader::ImageAsset;
use crate::config::SessionConfig;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::FrameRGBA;
use crate::render::surface::RenderSurface;

/// What the compositor picked for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSelection {
    /// Index into the loaded images.
    pub index: usize,
    /// Time since the selected image came on screen, `< per_image_duration`.
    pub local: Duration,
    /// Scale applied about the canvas centre on top of aspect-fill.
    pub zoom: f64,
}

/// Result of one compositor tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// A frame was drawn.
    Drawn(FrameSelection),
    /// The programme is over; nothing was drawn.
    Complete,
}

/// Select the image on screen at `elapsed`.
///
/// The index is clamped to the last image, and the local time is bounded to the clamped image
/// once the list is exhausted. `count` must be non-zero.
pub fn select_frame(elapsed: Duration, per_image: Duration, count: usize) -> (usize, Duration) {
    let per_ns = per_image.as_nanos().max(1);
    let el_ns = elapsed.as_nanos();
    let raw = el_ns / per_ns;
    let last = count.saturating_sub(1) as u128;
    if raw > last {
        // Past the end: hold the last image at its final instant.
        return (last as usize, per_image.saturating_sub(Duration::from_nanos(1)));
    }
    let local = Duration::from_nanos((el_ns % per_ns) as u64);
    (raw as usize, local)
}

/// Zoom factor at `local` into an image shown for `per_image`.
///
/// Linear from `1.0` at the start of the image to `1.0 + zoom_amount` at its end.
pub fn zoom_factor(local: Duration, per_image: Duration, zoom_amount: f64) -> f64 {
    if per_image.is_zero() {
        return 1.0;
    }
    let t = (local.as_secs_f64() / per_image.as_secs_f64()).clamp(0.0, 1.0);
    1.0 + zoom_amount * t
}

/// Owns the elapsed-time clock state and the rendering surface for a session.
pub struct Compositor {
    images: Vec<ImageAsset>,
    per_image: Duration,
    total: Duration,
    zoom_amount: f64,
    surface: RenderSurface,
    elapsed: Duration,
    current_index: usize,
    complete: bool,
}

impl Compositor {
    /// Build a compositor over the images that loaded successfully, in play order.
    pub fn new(images: Vec<ImageAsset>, cfg: &SessionConfig) -> ReelResult<Self> {
        if images.is_empty() {
            return Err(ReelError::validation("compositor needs at least one image"));
        }
        let surface = RenderSurface::new(cfg.canvas, cfg.background_rgba)?;
        let total = cfg.total_duration(images.len())?;
        Ok(Self {
            images,
            per_image: cfg.per_image_duration(),
            total,
            zoom_amount: cfg.zoom_amount,
            surface,
            elapsed: Duration::ZERO,
            current_index: 0,
            complete: false,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn canvas(&self) -> Canvas {
        self.surface.canvas()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of frames drawn so far.
    pub fn draw_count(&self) -> u64 {
        self.surface.draw_count()
    }

    /// Advance to `elapsed` and draw if the programme is still running.
    ///
    /// A timestamp older than the last one seen is treated as the last one, so the clock never
    /// runs backwards. Once complete, every further tick returns [`TickOutcome::Complete`].
    pub fn tick(&mut self, elapsed: Duration) -> TickOutcome {
        if self.complete {
            return TickOutcome::Complete;
        }
        self.elapsed = self.elapsed.max(elapsed);
        if self.elapsed >= self.total {
            self.complete = true;
            return TickOutcome::Complete;
        }

        let (index, local) = select_frame(self.elapsed, self.per_image, self.images.len());
        let zoom = zoom_factor(local, self.per_image, self.zoom_amount);
        self.current_index = index;
        self.surface.draw_cover(&self.images[index], zoom);
        TickOutcome::Drawn(FrameSelection { index, local, zoom })
    }

    /// Current surface contents.
    pub fn snapshot(&self) -> FrameRGBA {
        self.surface.snapshot()
    }

    /// Drop every decoded bitmap. Further ticks report completion.
    pub fn release(&mut self) {
        self.images.clear();
        self.complete = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
