//! Per-source counter within one queue.

use std::time::Instant;

/// Event counter for one (queue, source) pair.
///
/// `blocked` has no setter back to `false` other than [`QueueEntry::clear`],
/// which is how a window reset lifts a block.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    count: u32,
    window_start: Instant,
    blocked: bool,
}

impl QueueEntry {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked: false,
        }
    }

    /// Events counted in the current window.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub(crate) fn clear(&mut self, now: Instant) {
        self.count = 0;
        self.window_start = now;
        self.blocked = false;
    }

    pub(crate) fn increment(&mut self, weight: u32) {
        self.count = self.count.saturating_add(weight);
    }

    pub(crate) fn set_blocked(&mut self) {
        self.blocked = true;
    }
}
