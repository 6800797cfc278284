//! Shared data model for chunked logs.
//!
//! Logs are stored as ordered, immutable chunks. This crate defines the line,
//! chunk and time-range types exchanged between ingestion and retrieval, and
//! the persisted record format each chunk body is written in.

pub mod codec;
pub mod log;

pub use codec::{decode_record, encode_record, ChunkEncoder, CodecError};
pub use log::{LineVerdict, LogChunkInfo, LogLine, TimeRange};

pub mod prelude {
    pub use crate::codec::{ChunkEncoder, CodecError};
    pub use crate::log::{LineVerdict, LogChunkInfo, LogLine, TimeRange};
}
