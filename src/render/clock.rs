use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::ClockMode;
use crate::foundation::core::Fps;

/// Display-refresh source for the compositor.
///
/// Every call to [`FrameClock::tick`] resolves once per refresh and returns the elapsed time
/// since the clock was started. Returned values never decrease.
pub(crate) struct FrameClock {
    fps: Fps,
    ticks: u64,
    last: Duration,
    inner: ClockInner,
}

enum ClockInner {
    Realtime { start: Instant, interval: Interval },
    Offline,
}

impl FrameClock {
    /// Start a clock. The first tick resolves immediately with zero (or near-zero) elapsed.
    pub(crate) fn start(mode: ClockMode, fps: Fps) -> Self {
        let inner = match mode {
            ClockMode::Realtime => {
                let start = Instant::now();
                let mut interval = tokio::time::interval_at(start, fps.frame_interval());
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ClockInner::Realtime { start, interval }
            }
            ClockMode::Offline => ClockInner::Offline,
        };
        Self {
            fps,
            ticks: 0,
            last: Duration::ZERO,
            inner,
        }
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) async fn tick(&mut self) -> Duration {
        let elapsed = match &mut self.inner {
            ClockInner::Realtime { start, interval } => {
                interval.tick().await;
                Instant::now().saturating_duration_since(*start)
            }
            ClockInner::Offline => {
                // Still a suspension point, so cancellation and other tasks get a turn.
                tokio::task::yield_now().await;
                self.fps.frames_to_duration_ceil(self.ticks)
            }
        };
        self.ticks += 1;
        self.last = self.last.max(elapsed);
        self.last
    }
}
