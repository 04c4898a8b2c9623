//! XP-only undo snapshots and the bounded undo stack.
//!
//! # Invariants
//! - Snapshots carry `(tracker id, xp)` pairs only; log and timeline
//!   contents are never captured.
//! - The stack never holds more than its capacity; the oldest snapshot is
//!   dropped first.

use crate::model::state::{State, TrackerId};
use crate::model::MAX_HISTORY;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub schema_version: u32,
    pub tracker_xp: Vec<(TrackerId, i64)>,
}

impl HistorySnapshot {
    /// Captures the current XP of every tracker.
    pub fn capture(state: &State) -> Self {
        Self {
            schema_version: state.schema_version,
            tracker_xp: state
                .trackers
                .iter()
                .map(|tracker| (tracker.id.clone(), tracker.xp))
                .collect(),
        }
    }

    /// Writes snapshot XP values back onto trackers that still exist.
    ///
    /// Returns the number of trackers whose XP was overwritten.
    pub fn restore_into(&self, state: &mut State) -> usize {
        let mut restored = 0;
        for (id, xp) in &self.tracker_xp {
            if let Some(tracker) = state.tracker_mut(id) {
                tracker.xp = *xp;
                restored += 1;
            }
        }
        restored
    }
}

#[derive(Debug, Clone)]
pub struct UndoStack {
    snapshots: VecDeque<HistorySnapshot>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}

impl UndoStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: HistorySnapshot) {
        if self.capacity == 0 {
            return;
        }
        while self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Pops the most recent snapshot.
    pub fn pop(&mut self) -> Option<HistorySnapshot> {
        self.snapshots.pop_back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Oldest-first iterator over retained snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &HistorySnapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{HistorySnapshot, UndoStack};
    use crate::model::state::{Category, State, Tracker, TrackerId};

    fn snapshot(marker: i64) -> HistorySnapshot {
        HistorySnapshot {
            schema_version: 1,
            tracker_xp: vec![(TrackerId::from("t"), marker)],
        }
    }

    #[test]
    fn push_drops_oldest_beyond_capacity() {
        let mut stack = UndoStack::with_capacity(3);
        for marker in 0..5 {
            stack.push(snapshot(marker));
        }
        assert_eq!(stack.len(), 3);
        let retained: Vec<i64> = stack.iter().map(|snap| snap.tracker_xp[0].1).collect();
        assert_eq!(retained, vec![2, 3, 4]);
        assert_eq!(stack.pop().map(|snap| snap.tracker_xp[0].1), Some(4));
    }

    #[test]
    fn restore_skips_missing_trackers_and_leaves_others_untouched() {
        let kept = Tracker::new("kept", Category::Skill).with_xp(10);
        let untouched = Tracker::new("new", Category::Hobby).with_xp(7);
        let snap = HistorySnapshot {
            schema_version: 1,
            tracker_xp: vec![(kept.id.clone(), 3), (TrackerId::from("deleted"), 99)],
        };
        let mut state = State {
            trackers: vec![kept, untouched],
            ..State::default()
        };

        assert_eq!(snap.restore_into(&mut state), 1);
        assert_eq!(state.trackers[0].xp, 3);
        assert_eq!(state.trackers[1].xp, 7);
    }
}
