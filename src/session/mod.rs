//! Session ownership, lifecycle and resource accounting.

use std::sync::{Mutex, MutexGuard};

/// Stale-work detection.
pub mod epoch;
pub(crate) mod progress;
/// The end-to-end run.
pub mod render_session;
/// Live resource accounting.
pub mod resources;
/// Session state machine.
pub mod state;
/// Single-owner entry point.
pub mod studio;

/// Lock, recovering the data from a poisoned mutex. Session state stays meaningful after a panic
/// elsewhere, and teardown must still run.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
