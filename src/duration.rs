//! Playable runtime of a sequence of items.
//!
//! Consecutive items are separated by a fixed one second gap that collapses
//! at the playlist edges: a running (non-final) sequence pays `count - 1`
//! gaps, a final one pays `count`.

use crate::item::Trimmed;
use chrono::TimeDelta;

/// Seconds deducted between consecutive items.
pub const ITEM_GAP_SECS: i64 = 1;

/// Total playable runtime. Items without usable trim points add no length but
/// still count toward the gap deduction.
pub fn runtime<'a, T, I>(items: I, is_final: bool) -> TimeDelta
where
    T: Trimmed + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut tally = RuntimeTally::default();
    for item in items {
        tally.push(item);
    }
    tally.total(is_final)
}

/// Incremental form of [`runtime`]: the value after each `push` equals
/// `runtime` over everything pushed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeTally {
    clips: TimeDelta,
    count: i64,
}

impl RuntimeTally {
    pub fn push<T: Trimmed + ?Sized>(&mut self, item: &T) {
        if let Some(length) = item.clip_length() {
            self.clips += length;
        }
        self.count += 1;
    }

    /// Undo the contribution of an item previously pushed.
    pub fn pop<T: Trimmed + ?Sized>(&mut self, item: &T) {
        if let Some(length) = item.clip_length() {
            self.clips -= length;
        }
        self.count = (self.count - 1).max(0);
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn total(&self, is_final: bool) -> TimeDelta {
        let gaps = if is_final {
            self.count.max(0)
        } else {
            (self.count - 1).max(0)
        };
        self.clips - TimeDelta::seconds(ITEM_GAP_SECS * gaps)
    }
}
