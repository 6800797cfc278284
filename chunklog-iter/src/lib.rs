//! Retrieval of chunked logs.
//!
//! A log is a list of [`LogChunkInfo`](chunklog_protocol::LogChunkInfo)
//! entries whose bodies live in a [`BlobStore`]. The iterators in this crate
//! turn such a list back into one time-ordered stream of lines:
//!
//! - [`SequentialIterator`] fetches one chunk at a time;
//! - [`BatchedIterator`] keeps the next window of chunks downloading;
//! - [`ParallelIterator`] downloads every chunk up front with bounded workers;
//! - [`MergingIterator`] interleaves several logs by timestamp.
//!
//! All of them implement [`LogIterator`] and can be read as bytes through
//! [`LogIteratorReader`].

pub mod batched;
pub mod error;
mod fetch;
pub mod iterator;
pub mod merging;
pub mod parallel;
pub mod reader;
pub mod sequential;
pub mod store;
pub mod strategy;
#[cfg(test)]
mod testing;

pub use batched::BatchedIterator;
pub use error::{LogError, StoreError};
pub use iterator::{IteratorKind, LogIterator};
pub use merging::MergingIterator;
pub use parallel::ParallelIterator;
pub use reader::LogIteratorReader;
pub use sequential::SequentialIterator;
pub use store::{BlobStore, ByteStream, ChunkLines, ChunkStore, ObjectStoreBucket};
pub use strategy::{merge_logs, open_log};
