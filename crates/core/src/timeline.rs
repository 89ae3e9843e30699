//! Interval algebra over epoch-second validity windows.
//!
//! `begin == 0` means "since the beginning of time" and `end == 0` means
//! "still valid". Both are sentinels and never real instants.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const BEGINNING: i64 = 0;
pub const OPEN: i64 = 0;

/// Maps the open end sentinel to +infinity so ends compare numerically.
fn end_rank(end: i64) -> i64 {
    if end == OPEN { i64::MAX } else { end }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub begin: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(begin: i64, end: i64) -> Self {
        Self { begin, end }
    }

    /// Valid from the beginning of time, never closed.
    pub fn always() -> Self {
        Self::new(BEGINNING, OPEN)
    }

    pub fn is_open(&self) -> bool {
        self.end == OPEN
    }

    /// Non-negative bounds and, when closed, `end > begin`.
    pub fn is_well_formed(&self) -> bool {
        self.begin >= 0 && self.end >= 0 && (self.is_open() || self.end > self.begin)
    }

    /// Whether a fact valid over `self` qualifies for `slice`: it started no
    /// later than the slice and does not end before the slice does.
    pub fn covers(&self, slice: &Interval) -> bool {
        self.begin <= slice.begin && end_rank(self.end) >= end_rank(slice.end)
    }

    /// Point test used on the read path. The end bound is inclusive.
    pub fn contains(&self, at: i64) -> bool {
        self.begin <= at && (self.is_open() || self.end >= at)
    }
}

/// One entry of a precomputed per-entity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment<T> {
    pub begin: i64,
    pub end: i64,
    pub data: T,
}

impl<T> Segment<T> {
    pub fn new(interval: Interval, data: T) -> Self {
        Self {
            begin: interval.begin,
            end: interval.end,
            data,
        }
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.begin, self.end)
    }

    pub fn contains(&self, at: i64) -> bool {
        self.interval().contains(at)
    }
}

/// Coordinate-compress a set of intervals into the minimal ordered list of
/// non-overlapping slices whose boundaries include every input boundary.
/// The slice starting at the greatest boundary is left open.
pub fn slice<I>(intervals: I) -> Vec<Interval>
where
    I: IntoIterator<Item = Interval>,
{
    let points: BTreeSet<i64> = intervals
        .into_iter()
        .flat_map(|iv| [iv.begin, iv.end])
        .collect();

    let mut slices = Vec::with_capacity(points.len());
    let mut iter = points.into_iter().peekable();
    while let Some(begin) = iter.next() {
        let end = iter.peek().copied().unwrap_or(OPEN);
        slices.push(Interval::new(begin, end));
    }
    slices
}
