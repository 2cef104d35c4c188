//! Fixed-window counters for one category.
//!
//! Each source gets a lazily created [`QueueEntry`]. A check resets the entry
//! once its window has elapsed, adds the event weight, and blocks the source
//! when the count exceeds the queue threshold. A block is sticky until the
//! window that produced it has elapsed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::category::SourceId;
use super::entry::QueueEntry;

/// Result of counting one event against a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Under threshold.
    Allowed,
    /// This event pushed the source over the threshold.
    BlockedNew,
    /// The source was already blocked in the current window.
    BlockedSticky,
}

impl CheckOutcome {
    #[inline]
    pub fn is_blocked(self) -> bool {
        !matches!(self, Self::Allowed)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::BlockedNew => "blocked_new",
            Self::BlockedSticky => "blocked_sticky",
        }
    }
}

/// Rate-limiting bookkeeping for one category across many sources.
#[derive(Debug, Clone)]
pub struct SpamQueue {
    entries: HashMap<SourceId, QueueEntry>,
    threshold: u32,
    window: Duration,
}

impl SpamQueue {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            threshold,
            window,
        }
    }

    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the configuration. Existing entries are judged against the
    /// new values from their next check onwards.
    pub fn configure(&mut self, threshold: u32, window: Duration) {
        self.threshold = threshold;
        self.window = window;
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.threshold = threshold;
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Number of tracked sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view of a source's entry.
    pub fn get(&self, source: &SourceId) -> Option<&QueueEntry> {
        self.entries.get(source)
    }

    /// Fetch a source's entry, creating an empty one on first touch.
    pub fn entry_for(&mut self, source: SourceId, now: Instant) -> &mut QueueEntry {
        self.entries
            .entry(source)
            .or_insert_with(|| QueueEntry::new(now))
    }

    /// Zero-length windows count as always elapsed.
    fn window_elapsed(window: Duration, entry: &QueueEntry, now: Instant) -> bool {
        window.is_zero() || now.saturating_duration_since(entry.window_start()) > window
    }

    /// Count `weight` events from `source`.
    pub fn check(&mut self, source: SourceId, weight: u32, now: Instant) -> CheckOutcome {
        let threshold = self.threshold;
        let window = self.window;
        let entry = self.entry_for(source, now);

        let elapsed = Self::window_elapsed(window, entry, now);
        if entry.is_blocked() && !elapsed {
            return CheckOutcome::BlockedSticky;
        }
        if elapsed {
            entry.clear(now);
        }

        entry.increment(weight);
        if entry.count() > threshold {
            entry.set_blocked();
            return CheckOutcome::BlockedNew;
        }
        CheckOutcome::Allowed
    }

    /// Block a source without counting an event.
    pub fn force_block(&mut self, source: SourceId, now: Instant) {
        self.entry_for(source, now).set_blocked();
    }

    pub fn is_blocked(&self, source: &SourceId) -> bool {
        self.entries.get(source).is_some_and(QueueEntry::is_blocked)
    }

    /// Drop every entry.
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Drop entries whose window has elapsed and which are not blocked.
    /// Returns the number removed.
    pub fn purge_stale(&mut self, now: Instant) -> usize {
        let window = self.window;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_blocked() || !Self::window_elapsed(window, entry, now));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn queue() -> SpamQueue {
        SpamQueue::new(3, Duration::from_secs(60))
    }

    #[test]
    fn allows_up_to_threshold_then_blocks() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        for i in 0..3 {
            assert_eq!(q.check(src, 1, t0 + Duration::from_secs(i)), CheckOutcome::Allowed);
        }
        assert_eq!(q.check(src, 1, t0 + Duration::from_secs(5)), CheckOutcome::BlockedNew);
        assert_eq!(q.check(src, 1, t0 + Duration::from_secs(6)), CheckOutcome::BlockedSticky);
        assert!(q.is_blocked(&src));
    }

    #[test]
    fn sticky_checks_do_not_grow_counter() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        for _ in 0..4 {
            q.check(src, 1, t0);
        }
        let count = q.get(&src).map(QueueEntry::count);
        for _ in 0..10 {
            assert_eq!(q.check(src, 1, t0), CheckOutcome::BlockedSticky);
        }
        assert_eq!(q.get(&src).map(QueueEntry::count), count);
    }

    #[test]
    fn elapsed_window_resets_to_weight() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        for _ in 0..5 {
            q.check(src, 1, t0);
        }
        assert!(q.is_blocked(&src));

        let later = t0 + Duration::from_secs(61);
        assert_eq!(q.check(src, 2, later), CheckOutcome::Allowed);
        let entry = q.get(&src).unwrap();
        assert_eq!(entry.count(), 2);
        assert!(!entry.is_blocked());
        assert_eq!(entry.window_start(), later);
    }

    #[test]
    fn exactly_window_length_is_not_elapsed() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        q.check(src, 3, t0);
        assert_eq!(
            q.check(src, 1, t0 + Duration::from_secs(60)),
            CheckOutcome::BlockedNew
        );
    }

    #[test]
    fn heavy_single_event_blocks() {
        let mut q = queue();
        let src = Uuid::new_v4();
        assert_eq!(q.check(src, 4, Instant::now()), CheckOutcome::BlockedNew);
    }

    #[test]
    fn zero_threshold_blocks_first_event() {
        let mut q = SpamQueue::new(0, Duration::from_secs(60));
        assert_eq!(q.check(Uuid::new_v4(), 1, Instant::now()), CheckOutcome::BlockedNew);
    }

    #[test]
    fn zero_window_resets_every_check() {
        let mut q = SpamQueue::new(1, Duration::ZERO);
        let src = Uuid::new_v4();
        let t0 = Instant::now();
        for _ in 0..10 {
            assert_eq!(q.check(src, 1, t0), CheckOutcome::Allowed);
        }
        assert_eq!(q.check(src, 2, t0), CheckOutcome::BlockedNew);
        // The block does not survive the next (always elapsed) check.
        assert_eq!(q.check(src, 1, t0), CheckOutcome::Allowed);
    }

    #[test]
    fn force_block_without_prior_checks() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        q.force_block(src, t0);
        assert!(q.is_blocked(&src));
        assert_eq!(q.get(&src).unwrap().count(), 0);
        assert_eq!(q.check(src, 1, t0 + Duration::from_secs(30)), CheckOutcome::BlockedSticky);
        assert_eq!(q.check(src, 1, t0 + Duration::from_secs(61)), CheckOutcome::Allowed);
    }

    #[test]
    fn reconfigure_applies_to_next_check() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();

        q.check(src, 2, t0);
        q.configure(1, Duration::from_secs(60));
        assert_eq!(q.threshold(), 1);
        assert_eq!(q.check(src, 1, t0), CheckOutcome::BlockedNew);
    }

    #[test]
    fn purge_keeps_live_and_blocked_entries() {
        let mut q = queue();
        let t0 = Instant::now();
        let stale = Uuid::new_v4();
        let live = Uuid::new_v4();
        let blocked = Uuid::new_v4();

        q.check(stale, 1, t0);
        q.force_block(blocked, t0);
        q.check(live, 1, t0 + Duration::from_secs(30));

        let removed = q.purge_stale(t0 + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert!(q.get(&stale).is_none());
        assert!(q.get(&live).is_some());
        assert!(q.is_blocked(&blocked));
    }

    #[test]
    fn clear_all_forgets_blocks() {
        let mut q = queue();
        let src = Uuid::new_v4();
        let t0 = Instant::now();
        q.force_block(src, t0);
        q.clear_all();
        assert!(q.is_empty());
        assert!(!q.is_blocked(&src));
        assert_eq!(q.check(src, 1, t0), CheckOutcome::Allowed);
    }
}
