use async_trait::async_trait;
use chunklog_core::config::IteratorConfig;
use chunklog_protocol::{LogChunkInfo, LogLine, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::LogError;
use crate::fetch::{Lookahead, Prefetcher, ResidentChunks};
use crate::iterator::{relevant_chunks, IterState, IteratorKind, LogIterator};
use crate::store::ChunkStore;

/// Fetches every relevant chunk up front, bounded by a worker count, and
/// serves lines in chunk order as bodies arrive.
pub struct ParallelIterator {
    store: ChunkStore,
    range: TimeRange,
    workers: usize,
    pending: Option<Vec<LogChunkInfo>>,
    chunks: Option<ResidentChunks>,
    state: IterState,
}

impl ParallelIterator {
    pub fn new(store: ChunkStore, chunks: Vec<LogChunkInfo>, range: TimeRange) -> Self {
        Self {
            store,
            range,
            workers: IteratorConfig::default().parallel_workers,
            pending: Some(chunks),
            chunks: None,
            state: IterState::default(),
        }
    }

    /// Caps concurrent fetches at `workers` (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn start(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.chunks = Some(ResidentChunks::new(
                Prefetcher::new(self.store.clone(), self.workers),
                Lookahead::All,
                relevant_chunks(pending, &self.range),
                self.range,
            ));
        }
    }
}

#[async_trait]
impl LogIterator for ParallelIterator {
    fn kind(&self) -> IteratorKind {
        IteratorKind::Parallel
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if self.state.is_exhausted() {
            return false;
        }

        self.start();
        let workers = self.workers;
        let Some(resident) = self.chunks.as_mut() else {
            return self.state.finish();
        };
        match resident.next_line(cancel).await {
            Ok(Some(line)) => self.state.emit(line),
            Ok(None) => {
                resident.release();
                self.state.finish()
            }
            Err(err) => {
                warn!(error = %err, workers, "parallel iterator stopped");
                resident.release();
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
        self.pending = None;
        if let Some(resident) = self.chunks.as_mut() {
            resident.shutdown().await;
        }
        if !self.state.is_exhausted() {
            self.state.finish();
        }
        Ok(())
    }
}
