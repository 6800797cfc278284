//! Persisted record format of a chunk body.
//!
//! A chunk is a sequence of newline-terminated records:
//!
//! ```text
//! <unix nanos> <payload>\n
//! ```
//!
//! The timestamp token is the signed decimal count of nanoseconds since the
//! Unix epoch, followed by a single space. Everything after the space up to and
//! including the newline is the line data.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::log::{LogChunkInfo, LogLine};

const DELIMITER: u8 = b' ';
const TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("record is missing the timestamp delimiter")]
    MissingDelimiter,
    #[error("invalid timestamp token {token:?}")]
    InvalidTimestamp { token: String },
    #[error("timestamp {0} cannot be represented as unix nanoseconds")]
    TimestampOutOfRange(DateTime<Utc>),
    #[error("record payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("payload contains an embedded newline")]
    EmbeddedNewline,
    #[error("line at {timestamp} precedes the previous line at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}

/// Appends the persisted form of `line` to `out`.
///
/// A missing newline terminator is added; a newline anywhere else in the
/// payload is rejected because it would split the record in two.
pub fn write_record(out: &mut Vec<u8>, line: &LogLine) -> Result<(), CodecError> {
    let nanos = line
        .timestamp
        .timestamp_nanos_opt()
        .ok_or(CodecError::TimestampOutOfRange(line.timestamp))?;

    let payload = line.payload();
    if payload.as_bytes().contains(&TERMINATOR) {
        return Err(CodecError::EmbeddedNewline);
    }

    out.extend_from_slice(nanos.to_string().as_bytes());
    out.push(DELIMITER);
    out.extend_from_slice(payload.as_bytes());
    out.push(TERMINATOR);
    Ok(())
}

pub fn encode_record(line: &LogLine) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(line.data.len() + 21);
    write_record(&mut out, line)?;
    Ok(out)
}

/// Decodes one record, including its trailing newline if present.
pub fn decode_record(record: &[u8]) -> Result<LogLine, CodecError> {
    let split = record
        .iter()
        .position(|byte| *byte == DELIMITER)
        .ok_or(CodecError::MissingDelimiter)?;
    let (token, rest) = record.split_at(split);

    let invalid_token = || CodecError::InvalidTimestamp {
        token: String::from_utf8_lossy(token).into_owned(),
    };
    let nanos: i64 = std::str::from_utf8(token)
        .map_err(|_| invalid_token())?
        .parse()
        .map_err(|_| invalid_token())?;

    let data = std::str::from_utf8(&rest[1..]).map_err(|_| CodecError::InvalidUtf8)?;

    Ok(LogLine {
        timestamp: Utc.timestamp_nanos(nanos),
        data: data.to_string(),
    })
}

/// Builds one chunk body from ordered lines, tracking the metadata the
/// retrieval side needs.
#[derive(Debug)]
pub struct ChunkEncoder {
    key: String,
    body: Vec<u8>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    num_lines: usize,
}

impl ChunkEncoder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: Vec::new(),
            start: None,
            end: None,
            num_lines: 0,
        }
    }

    pub fn push(&mut self, line: &LogLine) -> Result<(), CodecError> {
        if let Some(previous) = self.end {
            if line.timestamp < previous {
                return Err(CodecError::OutOfOrder {
                    previous,
                    timestamp: line.timestamp,
                });
            }
        }

        write_record(&mut self.body, line)?;
        self.start.get_or_insert(line.timestamp);
        self.end = Some(line.timestamp);
        self.num_lines += 1;
        Ok(())
    }

    pub fn num_lines(&self) -> usize {
        self.num_lines
    }

    pub fn is_empty(&self) -> bool {
        self.num_lines == 0
    }

    pub fn encoded_len(&self) -> usize {
        self.body.len()
    }

    /// Returns the chunk metadata and body, or `None` if no line was pushed.
    pub fn finish(self) -> Option<(LogChunkInfo, Vec<u8>)> {
        let (start, end) = (self.start?, self.end?);
        let info = LogChunkInfo::new(self.key, start, end, self.num_lines);
        Some((info, self.body))
    }
}
