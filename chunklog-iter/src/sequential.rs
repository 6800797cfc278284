use std::collections::VecDeque;

use async_trait::async_trait;
use chunklog_protocol::{LineVerdict, LogChunkInfo, LogLine, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LogError;
use crate::iterator::{relevant_chunks, IterState, IteratorKind, LogIterator};
use crate::store::{ChunkLines, ChunkStore};

/// Fetches one chunk at a time and streams its lines.
///
/// This is the reference behaviour the other strategies reproduce: chunks
/// outside the time range are never opened, lines before the range are
/// skipped, and the first line after it ends the iteration.
pub struct SequentialIterator {
    store: ChunkStore,
    pending: VecDeque<LogChunkInfo>,
    source: Option<ChunkLines>,
    range: TimeRange,
    state: IterState,
}

impl SequentialIterator {
    pub fn new(store: ChunkStore, chunks: Vec<LogChunkInfo>, range: TimeRange) -> Self {
        Self {
            store,
            pending: relevant_chunks(chunks, &range),
            source: None,
            range,
            state: IterState::default(),
        }
    }

    fn release(&mut self) {
        self.source = None;
        self.pending.clear();
    }

    async fn next_line(&mut self, cancel: &CancellationToken) -> Result<Option<LogLine>, LogError> {
        loop {
            if self.source.is_none() {
                let Some(chunk) = self.pending.pop_front() else {
                    return Ok(None);
                };
                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(LogError::Cancelled),
                    opened = self.store.open_chunk(&chunk) => opened?,
                };
                self.source = Some(opened);
            }
            let Some(source) = self.source.as_mut() else {
                continue;
            };

            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LogError::Cancelled),
                line = source.next_line() => line?,
            };

            match line {
                Some(line) => match self.range.classify(line.timestamp) {
                    LineVerdict::Before => continue,
                    LineVerdict::Within => return Ok(Some(line)),
                    LineVerdict::After => {
                        debug!(key = %source.key(), "reached end of time range");
                        return Ok(None);
                    }
                },
                None => self.source = None,
            }
        }
    }
}

#[async_trait]
impl LogIterator for SequentialIterator {
    fn kind(&self) -> IteratorKind {
        IteratorKind::Sequential
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if self.state.is_exhausted() {
            return false;
        }
        if cancel.is_cancelled() {
            self.release();
            return self.state.fail(LogError::Cancelled);
        }

        match self.next_line(cancel).await {
            Ok(Some(line)) => self.state.emit(line),
            Ok(None) => {
                self.release();
                self.state.finish()
            }
            Err(err) => {
                warn!(error = %err, "sequential iterator stopped");
                self.release();
                self.state.fail(err)
            }
        }
    }

    fn current(&self) -> Option<&LogLine> {
        self.state.current()
    }

    fn error(&self) -> Option<&LogError> {
        self.state.error()
    }

    fn is_exhausted(&self) -> bool {
        self.state.is_exhausted()
    }

    async fn close(&mut self) -> Result<(), LogError> {
        self.release();
        if !self.state.is_exhausted() {
            self.state.finish();
        }
        Ok(())
    }
}
