use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::range::TimeRange;

/// Metadata for one immutable chunk of a log.
///
/// `start` and `end` are the timestamps of the first and last line stored in
/// the chunk. `num_lines` is computed at ingestion time and is only used for
/// offset bookkeeping by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunkInfo {
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub num_lines: usize,
}

impl LogChunkInfo {
    pub fn new(
        key: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        num_lines: usize,
    ) -> Self {
        Self {
            key: key.into(),
            start,
            end,
            num_lines,
        }
    }

    /// Whether any line of this chunk may fall inside `range`.
    pub fn is_relevant(&self, range: &TimeRange) -> bool {
        range.overlaps(self.start, self.end)
    }

    /// Total number of lines across `chunks`.
    pub fn total_lines(chunks: &[LogChunkInfo]) -> usize {
        chunks.iter().map(|chunk| chunk.num_lines).sum()
    }
}
