//! chunklog: retrieval of chunked, time-ordered logs.
//!
//! Large logs are persisted as ordered, immutable chunks in a blob store and
//! re-materialized as one stream of lines, optionally limited to a time range
//! and optionally merged across several logs.
//!
//! # Architecture
//!
//! * `chunklog-core`: configuration, canonical errors and tracing setup
//! * `chunklog-protocol`: lines, chunk metadata, time ranges and the record codec
//! * `chunklog-iter`: the chunk store adapter, iterators and stream reader
//!
//! [`ChunkLog`] wires a configured store to the configured iteration strategy.

pub mod service;

pub use chunklog_core::logging::{init_from_config, init_tracing};
pub use chunklog_core::{
    ChunkLogConfig, IteratorConfig, IteratorStrategy, StoreBackend, StoreConfig,
};
pub use chunklog_iter::{
    merge_logs, open_log, BatchedIterator, BlobStore, ByteStream, ChunkStore, IteratorKind,
    LogError, LogIterator, LogIteratorReader, MergingIterator, ObjectStoreBucket,
    ParallelIterator, SequentialIterator, StoreError,
};
pub use chunklog_protocol::{ChunkEncoder, LogChunkInfo, LogLine, TimeRange};
pub use service::ChunkLog;
pub use tokio_util::sync::CancellationToken;
