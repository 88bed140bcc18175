use std::time::Duration;

use crate::foundation::error::{ReelError, ReelResult};

pub use kurbo::{Affine, Vec2};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// 0-based index of a captured video frame (frame slot) in output timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ReelResult<Self> {
        if den == 0 {
            return Err(ReelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReelError::validation("Fps num must be > 0"));
        }
        let fps = Self { num, den };
        // The realtime clock cannot tick at a zero period.
        if fps.frame_interval().is_zero() {
            return Err(ReelError::validation(format!(
                "Fps {num}/{den} is too high: frame interval rounds to zero"
            )));
        }
        Ok(fps)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame, rounded down to whole nanoseconds.
    pub fn frame_interval(self) -> Duration {
        Duration::from_nanos(
            (NANOS_PER_SEC * u128::from(self.den) / u128::from(self.num)) as u64,
        )
    }

    /// Timestamp of frame slot `frames`, rounded up to whole nanoseconds.
    ///
    /// Rounding up keeps `frames_due(frames_to_duration_ceil(k)) == k + 1` exact for rational
    /// rates such as 30000/1001.
    pub fn frames_to_duration_ceil(self, frames: u64) -> Duration {
        let num = u128::from(frames) * NANOS_PER_SEC * u128::from(self.den);
        let den = u128::from(self.num);
        Duration::from_nanos(num.div_ceil(den) as u64)
    }

    /// Number of frame slots whose timestamp is `<= elapsed` (slot 0 is due at zero).
    pub fn frames_due(self, elapsed: Duration) -> u64 {
        let num = elapsed.as_nanos() * u128::from(self.num);
        let den = NANOS_PER_SEC * u128::from(self.den);
        (num / den) as u64 + 1
    }

    /// Number of frame slots needed to cover `total`, rounding up.
    pub fn frames_to_cover(self, total: Duration) -> u64 {
        let num = total.as_nanos() * u128::from(self.num);
        let den = NANOS_PER_SEC * u128::from(self.den);
        num.div_ceil(den) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Check the canvas fits the raster surface and a yuv420p encoder.
    pub fn validate(self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation("canvas width/height must be non-zero"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(ReelError::validation(
                "canvas width/height must fit in u16 (raster surface limit)",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // Encoders target yuv420p, which needs even dimensions.
            return Err(ReelError::validation(
                "canvas width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
