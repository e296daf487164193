//! Half-open time windows used throughout the engine.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Window of `duration` wall-clock time beginning at `start`. Saturates
    /// at the end of the representable range.
    pub fn starting_at(start: NaiveDateTime, duration: Duration) -> Self {
        Self::new(start, saturating_add(start, duration))
    }

    /// Window of `duration` wall-clock time ending at `end`.
    pub fn ending_at(end: NaiveDateTime, duration: Duration) -> Self {
        Self::new(saturating_add(end, -duration), end)
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Self { start, end })
    }

    pub fn shifted(&self, by: Duration) -> Self {
        Self::new(saturating_add(self.start, by), saturating_add(self.end, by))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M"),
            self.end.format("%Y-%m-%dT%H:%M")
        )
    }
}

fn saturating_add(instant: NaiveDateTime, by: Duration) -> NaiveDateTime {
    instant.checked_add_signed(by).unwrap_or(if by < Duration::zero() {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

/// Sorts and merges overlapping or touching windows in place.
pub(crate) fn merge_windows(windows: &mut Vec<TimeWindow>) {
    windows.retain(|w| !w.is_empty());
    windows.sort();
    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for window in windows.drain(..) {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                if window.end > last.end {
                    last.end = window.end;
                }
            }
            _ => merged.push(window),
        }
    }
    *windows = merged;
}

/// Removes `cut` from every window in `windows`, splitting where needed.
pub(crate) fn subtract_window(windows: &mut Vec<TimeWindow>, cut: &TimeWindow) {
    let mut out = Vec::with_capacity(windows.len() + 1);
    for window in windows.drain(..) {
        if !window.overlaps(cut) {
            out.push(window);
            continue;
        }
        if window.start < cut.start {
            out.push(TimeWindow::new(window.start, cut.start));
        }
        if cut.end < window.end {
            out.push(TimeWindow::new(cut.end, window.end));
        }
    }
    *windows = out;
}
