use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use chunklog_protocol::{LogChunkInfo, LogLine, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LogError;

/// Variant tag of a [`LogIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorKind {
    Sequential,
    Batched,
    Parallel,
    Merging,
}

impl fmt::Display for IteratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IteratorKind::Sequential => "sequential",
            IteratorKind::Batched => "batched",
            IteratorKind::Parallel => "parallel",
            IteratorKind::Merging => "merging",
        };
        f.write_str(name)
    }
}

/// Pull-based iterator over the lines of one or more logs.
///
/// A successful [`advance`](LogIterator::advance) makes a line available
/// through [`current`](LogIterator::current). Once `advance` returns `false`
/// the iterator is exhausted: [`error`](LogIterator::error) tells a normal end
/// apart from a failure, and every later call keeps returning `false`.
///
/// An instance serves a single consumer. [`close`](LogIterator::close) stops
/// and drains every background task the iterator started; it is idempotent
/// and valid at any point of the lifecycle.
#[async_trait]
pub trait LogIterator: Send {
    fn kind(&self) -> IteratorKind;

    /// Moves to the next in-range line. Returns `false` once exhausted, either
    /// normally, on error, or because `cancel` fired.
    async fn advance(&mut self, cancel: &CancellationToken) -> bool;

    /// Line produced by the last successful `advance`.
    fn current(&self) -> Option<&LogLine>;

    /// Terminal error, if the iterator stopped because of one.
    fn error(&self) -> Option<&LogError>;

    fn is_exhausted(&self) -> bool;

    async fn close(&mut self) -> Result<(), LogError>;
}

#[async_trait]
impl<I: LogIterator + ?Sized> LogIterator for Box<I> {
    fn kind(&self) -> IteratorKind {
        (**self).kind()
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        (**self).advance(cancel).await
    }

    fn current(&self) -> Option<&LogLine> {
        (**self).current()
    }

    fn error(&self) -> Option<&LogError> {
        (**self).error()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    async fn close(&mut self) -> Result<(), LogError> {
        (**self).close().await
    }
}

/// Current item and terminal status shared by every iterator variant.
#[derive(Debug, Default)]
pub(crate) struct IterState {
    current: Option<LogLine>,
    error: Option<LogError>,
    exhausted: bool,
}

impl IterState {
    pub(crate) fn current(&self) -> Option<&LogLine> {
        self.current.as_ref()
    }

    pub(crate) fn error(&self) -> Option<&LogError> {
        self.error.as_ref()
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn emit(&mut self, line: LogLine) -> bool {
        self.current = Some(line);
        true
    }

    /// Normal end of the log.
    pub(crate) fn finish(&mut self) -> bool {
        self.current = None;
        self.exhausted = true;
        false
    }

    /// Records the first terminal error; later errors are dropped.
    pub(crate) fn fail(&mut self, error: LogError) -> bool {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.finish()
    }
}

/// Chunks worth fetching for `range`, in the supplied order.
pub(crate) fn relevant_chunks(chunks: Vec<LogChunkInfo>, range: &TimeRange) -> VecDeque<LogChunkInfo> {
    let total = chunks.len();
    let relevant: VecDeque<LogChunkInfo> = chunks
        .into_iter()
        .filter(|chunk| chunk.is_relevant(range))
        .collect();
    if relevant.len() < total {
        debug!(
            total,
            relevant = relevant.len(),
            "pruned chunks outside the time range"
        );
    }
    relevant
}
