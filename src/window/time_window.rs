use crate::HarvestError;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fmt;

/// A half-open range of time `[from, to)`
///
/// Adjacent windows share a boundary instant, which belongs to the later
/// window only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting empty or inverted ranges
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, HarvestError> {
        if from >= to {
            return Err(HarvestError::InvalidWindow(format!(
                "window start {} is not before end {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// Whether the window is longer than the split floor
    ///
    /// A window exactly at the floor is not split again.
    pub fn is_splittable(&self, min_window: Duration) -> bool {
        self.duration() > min_window
    }

    /// The temporal midpoint, rounded down to the nanosecond
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.from + self.duration() / 2
    }

    /// Bisects the window into `[from, mid)` and `[mid, to)`
    ///
    /// Returns `None` when the window is too short to yield two non-empty halves.
    pub fn split(&self) -> Option<(TimeWindow, TimeWindow)> {
        let mid = self.midpoint();
        if mid <= self.from || mid >= self.to {
            return None;
        }
        Some((
            TimeWindow {
                from: self.from,
                to: mid,
            },
            TimeWindow { from: mid, to: self.to },
        ))
    }

    /// Whether `instant` falls inside the half-open range
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant < self.to
    }

    /// RFC 3339 rendering of the start, as sent to the API
    pub fn from_param(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// RFC 3339 rendering of the end, as sent to the API
    pub fn to_param(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} -> {})",
            self.from.format("%Y-%m-%d %H:%M"),
            self.to.format("%Y-%m-%d %H:%M")
        )
    }
}
