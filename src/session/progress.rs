use std::time::Duration;

use tokio::sync::watch;

/// Publishes a 0..=100 progress value that never decreases.
///
/// The first `allowance` percent cover loading; the rest tracks recorded time.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    tx: watch::Sender<u8>,
    allowance: u8,
}

impl ProgressReporter {
    pub(crate) fn new(allowance: u8) -> (Self, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0u8);
        (
            Self {
                tx,
                allowance: allowance.min(100),
            },
            rx,
        )
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub(crate) fn loading(&self, done: usize, total: usize) {
        let frac = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        self.publish((f64::from(self.allowance) * frac).floor() as u8);
    }

    pub(crate) fn recording(&self, elapsed: Duration, total: Duration) {
        let frac = if total.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
        };
        let span = f64::from(100 - self.allowance);
        let value = f64::from(self.allowance) + span * frac;
        // 100 is reserved for a finished artifact.
        self.publish((value.floor() as u8).min(99));
    }

    pub(crate) fn complete(&self) {
        self.publish(100);
    }

    fn publish(&self, value: u8) {
        let value = value.min(100);
        self.tx.send_if_modified(|cur| {
            if value > *cur {
                *cur = value;
                true
            } else {
                false
            }
        });
    }
}
