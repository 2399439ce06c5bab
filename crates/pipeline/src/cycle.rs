//! Refresh-cycle supersession.
//!
//! Each refresh takes a token when it starts. Only the most recently started
//! cycle may publish; anything older that finishes late is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Identifies one started refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CycleToken(u64);

impl CycleToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing cycle tokens.
#[derive(Debug, Default)]
pub struct CycleTracker {
    started: AtomicU64,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle, superseding every earlier one.
    pub fn begin(&self) -> CycleToken {
        CycleToken(self.started.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True if no cycle has started since `token`.
    pub fn is_current(&self, token: CycleToken) -> bool {
        self.started.load(Ordering::SeqCst) == token.0
    }
}

/// The output of the newest cycle that has finished.
#[derive(Debug)]
pub struct LatestOutput<T> {
    tracker: CycleTracker,
    slot: Mutex<Option<T>>,
}

impl<T> Default for LatestOutput<T> {
    fn default() -> Self {
        Self {
            tracker: CycleTracker::new(),
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestOutput<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> CycleToken {
        self.tracker.begin()
    }

    /// Store `output` if `token` is still the newest cycle. Returns whether it was stored.
    pub fn publish(&self, token: CycleToken, output: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.tracker.is_current(token) {
            return false;
        }
        *slot = Some(output);
        true
    }

    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }
}
