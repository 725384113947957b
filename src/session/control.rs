//! Pause/resume/stop signalling and the scheduler's wait-if-paused primitive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::config;
use crate::errors::ScanError;

/// Per-session control flags. All setters are idempotent and callable from
/// any observer; stop is sticky.
#[derive(Debug, Default)]
pub struct ControlFlags {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// `(isPaused, isStopped)` pair.
    pub fn snapshot(&self) -> (bool, bool) {
        (self.is_paused(), self.is_stopped())
    }
}

/// Suspend while paused, polling at ~100 ms cadence. A sticky stop raises
/// `ScanError::Stopped`, which the coordinator catches to finalize cleanly.
pub async fn wait_if_paused(flags: &ControlFlags) -> Result<(), ScanError> {
    loop {
        if flags.is_stopped() {
            return Err(ScanError::Stopped);
        }
        if !flags.is_paused() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(config::PAUSE_POLL_INTERVAL_MS)).await;
    }
}
