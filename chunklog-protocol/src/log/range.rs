use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a line timestamp falls relative to a [`TimeRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    Before,
    Within,
    After,
}

/// Time window for log retrieval. Both bounds are inclusive; `None` leaves
/// that side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self {
            start_at: Some(start_at),
            end_at: Some(end_at),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn since(start_at: DateTime<Utc>) -> Self {
        Self {
            start_at: Some(start_at),
            end_at: None,
        }
    }

    pub fn until(end_at: DateTime<Utc>) -> Self {
        Self {
            start_at: None,
            end_at: Some(end_at),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start_at.is_none() && self.end_at.is_none()
    }

    pub fn classify(&self, timestamp: DateTime<Utc>) -> LineVerdict {
        if self.start_at.is_some_and(|start| timestamp < start) {
            LineVerdict::Before
        } else if self.end_at.is_some_and(|end| timestamp > end) {
            LineVerdict::After
        } else {
            LineVerdict::Within
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.classify(timestamp) == LineVerdict::Within
    }

    /// Whether the closed interval `[start, end]` intersects this range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let ends_before = self.start_at.is_some_and(|range_start| end < range_start);
        let starts_after = self.end_at.is_some_and(|range_end| start > range_end);
        !ends_before && !starts_after
    }
}
