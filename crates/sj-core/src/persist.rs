//! Debounced save tracking
//!
//! The engine never touches storage. It only records which sections of the
//! configuration changed, and tells the host when a burst of edits has gone
//! quiet long enough to be written out in one go. Time is supplied by the
//! host as milliseconds so the tracker works the same natively and in wasm.

bitflags::bitflags! {
    /// Configuration sections that need writing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SaveSections: u8 {
        /// Defaults, ping flag and the site tree
        const POLICY = 1 << 0;
        /// The global script list
        const BLACKLIST = 1 << 1;

        const ALL = Self::POLICY.bits() | Self::BLACKLIST.bits();
    }
}

/// Coalesces edits into debounced saves.
#[derive(Debug, Clone)]
pub struct SaveTracker {
    window_ms: u64,
    pending: SaveSections,
    /// Host time of the most recent edit
    last_edit_ms: u64,
}

impl SaveTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending: SaveSections::empty(),
            last_edit_ms: 0,
        }
    }

    /// Record an edit to `sections` made at `now_ms`.
    pub fn mark(&mut self, sections: SaveSections, now_ms: u64) {
        self.pending |= sections;
        self.last_edit_ms = now_ms;
    }

    /// Check if anything is waiting to be written.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Sections waiting to be written.
    pub fn pending(&self) -> SaveSections {
        self.pending
    }

    /// Take the pending sections once `window_ms` has passed since the last
    /// edit.
    pub fn take_due(&mut self, now_ms: u64) -> Option<SaveSections> {
        if self.pending.is_empty() || now_ms.saturating_sub(self.last_edit_ms) < self.window_ms {
            return None;
        }
        self.flush()
    }

    /// Take the pending sections immediately, ignoring the window.
    pub fn flush(&mut self) -> Option<SaveSections> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::replace(&mut self.pending, SaveSections::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending() {
        let mut tracker = SaveTracker::new(1000);
        assert_eq!(tracker.take_due(0), None);
        assert_eq!(tracker.take_due(5000), None);
        assert_eq!(tracker.flush(), None);
    }

    #[test]
    fn test_single_edit_debounced() {
        let mut tracker = SaveTracker::new(1000);
        tracker.mark(SaveSections::POLICY, 100);
        assert_eq!(tracker.take_due(900), None);
        assert_eq!(tracker.take_due(1099), None);
        assert_eq!(tracker.take_due(1100), Some(SaveSections::POLICY));
        assert!(!tracker.is_pending());
        assert_eq!(tracker.take_due(5000), None);
    }

    #[test]
    fn test_window_runs_from_edit_not_first_poll() {
        let mut tracker = SaveTracker::new(1000);
        tracker.mark(SaveSections::BLACKLIST, 0);
        // first poll long after the edit: already due
        assert_eq!(tracker.take_due(1500), Some(SaveSections::BLACKLIST));
    }

    #[test]
    fn test_burst_coalesces_and_restarts_window() {
        let mut tracker = SaveTracker::new(1000);
        tracker.mark(SaveSections::POLICY, 0);
        assert_eq!(tracker.take_due(500), None);
        tracker.mark(SaveSections::BLACKLIST, 800);
        assert_eq!(tracker.take_due(1500), None);
        assert_eq!(tracker.pending(), SaveSections::ALL);
        assert_eq!(tracker.take_due(1800), Some(SaveSections::ALL));
    }

    #[test]
    fn test_flush_ignores_window() {
        let mut tracker = SaveTracker::new(1000);
        tracker.mark(SaveSections::BLACKLIST, 0);
        assert_eq!(tracker.flush(), Some(SaveSections::BLACKLIST));
        assert_eq!(tracker.take_due(10_000), None);
    }
}
