//! Cursor ownership.
//!
//! The cursor is the id of the next update to request. It has exactly one
//! writer, the [`OffsetTracker`], which requires `&mut self` to advance. Any
//! number of [`CursorReader`] handles can observe it, e.g. for external
//! checkpointing.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::trace;

use crate::foundation::update::UpdateId;

/// Owner of the polling cursor.
///
/// The cursor never decreases. [`advance`](Self::advance) is idempotent and
/// tolerates out-of-order calls.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    cursor: Arc<AtomicI64>,
}

impl OffsetTracker {
    /// Creates a tracker starting at `initial`.
    pub fn new(initial: UpdateId) -> Self {
        Self {
            cursor: Arc::new(AtomicI64::new(initial)),
        }
    }

    /// Returns the current cursor.
    pub fn current(&self) -> UpdateId {
        self.cursor.load(Ordering::Acquire)
    }

    /// Moves the cursor past `highest_seen`.
    ///
    /// Sets the cursor to `highest_seen + 1` unless it is already at or past
    /// that value. Returns `true` if the cursor moved.
    pub fn advance(&mut self, highest_seen: UpdateId) -> bool {
        let next = highest_seen.saturating_add(1);
        let previous = self.cursor.fetch_max(next, Ordering::AcqRel);
        let moved = next > previous;
        if moved {
            trace!(from = previous, to = next, "Cursor advanced");
        }
        moved
    }

    /// Returns a read-only handle to the cursor.
    pub fn reader(&self) -> CursorReader {
        CursorReader {
            cursor: Arc::clone(&self.cursor),
        }
    }
}

/// Read-only view of an [`OffsetTracker`]'s cursor.
#[derive(Debug, Clone)]
pub struct CursorReader {
    cursor: Arc<AtomicI64>,
}

impl CursorReader {
    /// Returns a snapshot of the cursor.
    pub fn get(&self) -> UpdateId {
        self.cursor.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_sets_next_id() {
        let mut tracker = OffsetTracker::new(5);
        assert!(tracker.advance(6));
        assert_eq!(tracker.current(), 7);
    }

    #[test]
    fn test_advance_never_decreases() {
        let mut tracker = OffsetTracker::new(7);
        assert!(!tracker.advance(4));
        assert_eq!(tracker.current(), 7);

        assert!(!tracker.advance(6));
        assert_eq!(tracker.current(), 7);
    }

    #[test]
    fn test_out_of_order_calls_are_monotonic() {
        let mut tracker = OffsetTracker::default();
        let mut last = tracker.current();
        for id in [3, 1, 10, 2, 10, 9, 11, 0] {
            tracker.advance(id);
            assert!(tracker.current() >= last);
            last = tracker.current();
        }
        assert_eq!(tracker.current(), 12);
    }

    #[test]
    fn test_advance_saturates() {
        let mut tracker = OffsetTracker::new(0);
        tracker.advance(i64::MAX);
        assert_eq!(tracker.current(), i64::MAX);
    }

    #[test]
    fn test_reader_sees_updates() {
        let mut tracker = OffsetTracker::new(1);
        let reader = tracker.reader();
        tracker.advance(41);
        assert_eq!(reader.get(), 42);
    }
}
