//! Process-wide interrupt signal for a running mission.
//!
//! One external writer (operator or safety channel) raises the level; the
//! sequencer and in-flight behaviors read it. The level lives in a single
//! atomic byte so reads never tear and no lock is taken.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// How the mission should proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterruptLevel {
    None,
    PauseRequested,
    AbortRequested,
}

impl From<u8> for InterruptLevel {
    fn from(v: u8) -> Self {
        match v {
            1 => InterruptLevel::PauseRequested,
            2 => InterruptLevel::AbortRequested,
            _ => InterruptLevel::None,
        }
    }
}

impl From<InterruptLevel> for u8 {
    fn from(level: InterruptLevel) -> Self {
        match level {
            InterruptLevel::None => 0,
            InterruptLevel::PauseRequested => 1,
            InterruptLevel::AbortRequested => 2,
        }
    }
}

/// Shared handle on the interrupt signal. Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    level: Arc<AtomicU8>,
    pause_acknowledged: Arc<AtomicBool>,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic snapshot of the current level
    pub fn signal(&self) -> InterruptLevel {
        InterruptLevel::from(self.level.load(Ordering::SeqCst))
    }

    /// Escalate the signal. Lower levels than the current one are ignored,
    /// so an abort can never be downgraded to a pause.
    pub fn raise(&self, level: InterruptLevel) {
        let new: u8 = level.into();
        let previous = self.level.fetch_max(new, Ordering::SeqCst);
        if new > previous {
            self.pause_acknowledged.store(false, Ordering::SeqCst);
            tracing::info!(?level, "interrupt raised");
        }
    }

    pub fn pause(&self) {
        self.raise(InterruptLevel::PauseRequested);
    }

    pub fn abort(&self) {
        self.raise(InterruptLevel::AbortRequested);
    }

    /// Lift a pause. Has no effect once an abort was raised.
    pub fn clear(&self) {
        let paused: u8 = InterruptLevel::PauseRequested.into();
        if self
            .level
            .compare_exchange(paused, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.pause_acknowledged.store(false, Ordering::SeqCst);
            tracing::info!("pause cleared");
        }
    }

    /// Return to `None` unconditionally. Reserved for whoever restarts the mission.
    pub fn reset(&self) {
        self.level.store(0, Ordering::SeqCst);
        self.pause_acknowledged.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.signal() == InterruptLevel::AbortRequested
    }

    /// Marks that a reader has suspended on the current pause
    pub fn acknowledge_pause(&self) {
        self.pause_acknowledged.store(true, Ordering::SeqCst);
    }

    pub fn is_pause_acknowledged(&self) -> bool {
        self.pause_acknowledged.load(Ordering::SeqCst)
    }
}
