//! Half-open time intervals and the set operations the planner is built on.
//!
//! All intervals are `[start, end)`. The availability resolver and the
//! constraint scheduler share the same primitives: overlap testing,
//! sort-then-sweep merging of busy intervals, and subtraction of busy time
//! from a free window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` span of time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Create a new interval. Callers are expected to pass `start < end`;
    /// degenerate intervals are harmless but never produced by the planner.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Duration in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whether this interval overlaps another (shared boundary is not overlap).
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Whether a span of `minutes` fits inside this interval.
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes() >= minutes
    }

    /// Whether the interval is empty or inverted.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Merge overlapping and adjacent intervals into a sorted, disjoint list.
///
/// Classic sort-then-sweep, O(n log n). Adjacent intervals (end == start)
/// coalesce, so the output contains no zero-width seams.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals
        .iter()
        .filter(|iv| !iv.is_empty())
        .cloned()
        .collect();
    sorted.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => {
                if iv.end > last.end {
                    last.end = iv.end;
                }
            }
            _ => merged.push(iv),
        }
    }
    merged
}

/// Subtract one busy interval from a free window.
///
/// Returns the zero, one, or two remaining pieces in order.
pub fn subtract_one(window: &Interval, busy: &Interval) -> Vec<Interval> {
    if !window.overlaps(busy) {
        return vec![window.clone()];
    }
    let mut pieces = Vec::with_capacity(2);
    if busy.start > window.start {
        pieces.push(Interval::new(window.start, busy.start));
    }
    if busy.end < window.end {
        pieces.push(Interval::new(busy.end, window.end));
    }
    pieces
}

/// Subtract a set of busy intervals from a free window.
///
/// Busy intervals are merged first, so the result is sorted and disjoint.
pub fn subtract_all(window: &Interval, busy: &[Interval]) -> Vec<Interval> {
    let mut free = vec![window.clone()];
    for b in merge_intervals(busy) {
        let mut next = Vec::with_capacity(free.len() + 1);
        for piece in &free {
            next.extend(subtract_one(piece, &b));
        }
        free = next;
    }
    free.retain(|iv| !iv.is_empty());
    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 5, h, m, 0).unwrap()
    }

    fn iv(sh: u32, sm: u32, eh: u32, em: u32) -> Interval {
        Interval::new(at(sh, sm), at(eh, em))
    }

    #[test]
    fn overlap_is_exclusive_of_shared_boundary() {
        assert!(iv(9, 0, 10, 0).overlaps(&iv(9, 30, 11, 0)));
        assert!(!iv(9, 0, 10, 0).overlaps(&iv(10, 0, 11, 0)));
        assert!(!iv(9, 0, 10, 0).overlaps(&iv(8, 0, 9, 0)));
    }

    #[test]
    fn merge_coalesces_overlapping_and_adjacent() {
        let merged = merge_intervals(&[iv(11, 0, 12, 0), iv(9, 0, 10, 0), iv(10, 0, 10, 30)]);
        assert_eq!(merged, vec![iv(9, 0, 10, 30), iv(11, 0, 12, 0)]);
    }

    #[test]
    fn merge_drops_empty_intervals() {
        let merged = merge_intervals(&[iv(9, 0, 9, 0), iv(10, 0, 11, 0)]);
        assert_eq!(merged, vec![iv(10, 0, 11, 0)]);
    }

    #[test]
    fn subtraction_splits_window_around_busy_middle() {
        let free = subtract_all(&iv(9, 0, 17, 0), &[iv(12, 0, 13, 0)]);
        assert_eq!(free, vec![iv(9, 0, 12, 0), iv(13, 0, 17, 0)]);
    }

    #[test]
    fn subtraction_clips_busy_overhang() {
        let free = subtract_all(&iv(9, 0, 17, 0), &[iv(8, 0, 10, 0), iv(16, 30, 18, 0)]);
        assert_eq!(free, vec![iv(10, 0, 16, 30)]);
    }

    #[test]
    fn subtraction_of_covering_busy_yields_nothing() {
        let free = subtract_all(&iv(9, 0, 17, 0), &[iv(8, 0, 18, 0)]);
        assert!(free.is_empty());
    }

    // Strategy: intervals at minute granularity within one working day.
    fn minute_interval() -> impl Strategy<Value = Interval> {
        (0i64..720, 1i64..180).prop_map(|(offset, len)| {
            let base = at(6, 0);
            Interval::new(
                base + chrono::Duration::minutes(offset),
                base + chrono::Duration::minutes(offset + len),
            )
        })
    }

    proptest! {
        /// Merged output is sorted and strictly disjoint.
        #[test]
        fn merge_output_is_disjoint(ivs in prop::collection::vec(minute_interval(), 0..12)) {
            let merged = merge_intervals(&ivs);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }

        /// free(window \ busy) plus busy clipped to the window reconstructs
        /// the window minute for minute.
        #[test]
        fn subtract_then_readd_reconstructs_window(
            busy in prop::collection::vec(minute_interval(), 0..10)
        ) {
            let window = iv(6, 0, 21, 0);
            let free = subtract_all(&window, &busy);

            let mut pieces = free.clone();
            for b in merge_intervals(&busy) {
                let clipped = Interval::new(b.start.max(window.start), b.end.min(window.end));
                if !clipped.is_empty() {
                    pieces.push(clipped);
                }
            }
            let rebuilt = merge_intervals(&pieces);
            prop_assert_eq!(rebuilt, vec![window]);
        }

        /// No free interval overlaps any busy interval.
        #[test]
        fn free_never_overlaps_busy(
            busy in prop::collection::vec(minute_interval(), 0..10)
        ) {
            let window = iv(6, 0, 21, 0);
            for f in subtract_all(&window, &busy) {
                for b in &busy {
                    prop_assert!(!f.overlaps(b));
                }
            }
        }
    }
}
