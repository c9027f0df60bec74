//! Current-track cursor over the catalog.
//!
//! The navigator only tracks *which* index is current; loading it is the worker's job.

use crate::error::{EngineError, Result};

/// Outcome of a forward or backward step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Move to an adjacent index.
    Moved(usize),
    /// Crossed a queue boundary with loop-all enabled.
    Wrapped(usize),
    /// Stepped forward past the last track without looping.
    QueueEnd,
    /// Nothing to do (backward at the first track without looping).
    Stay,
}

impl Step {
    pub fn target(self) -> Option<usize> {
        match self {
            Step::Moved(i) | Step::Wrapped(i) => Some(i),
            Step::QueueEnd | Step::Stay => None,
        }
    }
}

/// Effect of a catalog removal on the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// The current track stays current (its index may have shifted).
    Unaffected,
    /// The current track was removed; `successor` now sits at the same index, if any.
    CurrentRemoved { successor: Option<usize> },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueNavigator {
    current: Option<usize>,
    /// Set after stepping forward past the last track; `previous` returns to `current`.
    past_end: bool,
}

impl QueueNavigator {
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn is_past_end(&self) -> bool {
        self.past_end
    }

    pub fn select(&mut self, index: usize) {
        self.current = Some(index);
        self.past_end = false;
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.past_end = false;
    }

    pub fn mark_past_end(&mut self) {
        if self.current.is_some() {
            self.past_end = true;
        }
    }

    pub fn check_index(index: usize, len: usize) -> Result<usize> {
        if index < len {
            Ok(index)
        } else {
            Err(EngineError::IndexOutOfRange { index, len })
        }
    }

    pub fn next(&self, len: usize, loop_all: bool) -> Step {
        if len == 0 {
            return Step::QueueEnd;
        }
        let Some(current) = self.current else {
            return Step::Moved(0);
        };
        if !self.past_end && current + 1 < len {
            return Step::Moved(current + 1);
        }
        if loop_all {
            Step::Wrapped(0)
        } else {
            Step::QueueEnd
        }
    }

    pub fn previous(&self, len: usize, loop_all: bool) -> Step {
        let Some(current) = self.current else {
            return Step::Stay;
        };
        if len == 0 {
            return Step::Stay;
        }
        if self.past_end {
            return Step::Moved(current.min(len - 1));
        }
        if current > 0 {
            return Step::Moved(current - 1);
        }
        if loop_all {
            Step::Wrapped(len - 1)
        } else {
            Step::Stay
        }
    }

    pub fn has_next(&self, len: usize, loop_all: bool) -> bool {
        match self.next(len, loop_all) {
            // From no selection, "next" means starting the queue; not a following track.
            Step::Moved(_) if self.current.is_none() => false,
            step => step.target().is_some(),
        }
    }

    pub fn has_previous(&self, len: usize, loop_all: bool) -> bool {
        self.previous(len, loop_all).target().is_some()
    }

    /// Shift the cursor after `count` tracks were inserted at `at`.
    ///
    /// Tracks appended behind an ended queue make it continuable again.
    pub fn on_inserted(&mut self, at: usize, count: usize) {
        if let Some(current) = self.current.as_mut() {
            if at <= *current {
                *current += count;
            } else if count > 0 {
                self.past_end = false;
            }
        }
    }

    /// Update the cursor after the track at `index` was removed; `len` is the new length.
    pub fn on_removed(&mut self, index: usize, len: usize) -> Removal {
        let Some(current) = self.current else {
            return Removal::Unaffected;
        };
        if index < current {
            self.current = Some(current - 1);
            Removal::Unaffected
        } else if index == current {
            let successor = (index < len).then_some(index);
            self.current = successor;
            self.past_end = false;
            Removal::CurrentRemoved { successor }
        } else {
            Removal::Unaffected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(index: usize) -> QueueNavigator {
        let mut nav = QueueNavigator::default();
        nav.select(index);
        nav
    }

    #[test]
    fn next_moves_and_stops_at_end_without_loop() {
        assert_eq!(at(0).next(3, false), Step::Moved(1));
        assert_eq!(at(2).next(3, false), Step::QueueEnd);
        assert_eq!(at(2).next(3, true), Step::Wrapped(0));
    }

    #[test]
    fn next_without_selection_starts_queue() {
        let nav = QueueNavigator::default();
        assert_eq!(nav.next(2, false), Step::Moved(0));
        assert_eq!(nav.next(0, false), Step::QueueEnd);
        assert!(!nav.has_next(2, false));
    }

    #[test]
    fn previous_at_first_is_noop_unless_looping() {
        assert_eq!(at(0).previous(3, false), Step::Stay);
        assert_eq!(at(0).previous(3, true), Step::Wrapped(2));
        assert_eq!(at(2).previous(3, false), Step::Moved(1));
    }

    #[test]
    fn previous_after_queue_end_returns_to_last() {
        let mut nav = at(2);
        assert_eq!(nav.next(3, false), Step::QueueEnd);
        nav.mark_past_end();
        assert!(nav.is_past_end());
        assert_eq!(nav.previous(3, false), Step::Moved(2));
        assert_eq!(nav.next(3, false), Step::QueueEnd);
        assert_eq!(nav.next(3, true), Step::Wrapped(0));
    }

    #[test]
    fn insert_after_queue_end_reopens_next() {
        let mut nav = at(1);
        nav.mark_past_end();
        nav.on_inserted(0, 1);
        assert_eq!(nav.current(), Some(2));
        assert!(nav.is_past_end());

        nav.on_inserted(3, 1);
        assert!(!nav.is_past_end());
        assert_eq!(nav.next(4, false), Step::Moved(3));
        assert!(nav.has_next(4, false));
    }

    #[test]
    fn has_next_and_previous_follow_loop_flag() {
        let nav = at(1);
        assert!(!nav.has_next(2, false));
        assert!(nav.has_next(2, true));
        assert!(nav.has_previous(2, false));
        assert!(!at(0).has_previous(2, false));
    }

    #[test]
    fn insert_before_current_shifts_cursor() {
        let mut nav = at(1);
        nav.on_inserted(0, 2);
        assert_eq!(nav.current(), Some(3));
        nav.on_inserted(4, 1);
        assert_eq!(nav.current(), Some(3));
    }

    #[test]
    fn removing_current_picks_successor_at_same_index() {
        let mut nav = at(1);
        assert_eq!(
            nav.on_removed(1, 2),
            Removal::CurrentRemoved { successor: Some(1) }
        );
        assert_eq!(nav.current(), Some(1));

        let mut nav = at(2);
        assert_eq!(nav.on_removed(2, 2), Removal::CurrentRemoved { successor: None });
        assert_eq!(nav.current(), None);
    }

    #[test]
    fn removing_other_tracks_keeps_current_identity() {
        let mut nav = at(2);
        assert_eq!(nav.on_removed(0, 3), Removal::Unaffected);
        assert_eq!(nav.current(), Some(1));
        assert_eq!(nav.on_removed(2, 2), Removal::Unaffected);
        assert_eq!(nav.current(), Some(1));
        assert!(!nav.is_past_end());
    }

    #[test]
    fn check_index_rejects_out_of_range() {
        assert_eq!(QueueNavigator::check_index(1, 2), Ok(1));
        assert_eq!(
            QueueNavigator::check_index(2, 2),
            Err(EngineError::IndexOutOfRange { index: 2, len: 2 })
        );
    }
}
