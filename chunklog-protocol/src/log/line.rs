use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record of a log.
///
/// `data` keeps the trailing newline the record was written with, so the
/// concatenation of every `data` in a log reproduces the raw log text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, data: impl Into<String>) -> Self {
        Self {
            timestamp,
            data: data.into(),
        }
    }

    /// Payload without its newline terminator.
    pub fn payload(&self) -> &str {
        self.data.strip_suffix('\n').unwrap_or(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
