//! Background chunk fetching shared by the batched and parallel iterators.
//!
//! A [`Prefetcher`] owns every fetch task it spawns. Tasks wait for a permit
//! from the per-instance limiter, download one chunk body and hand it back
//! through a oneshot channel. A task stops as soon as the consumer's token or
//! the prefetcher's shutdown fires. Failures additionally go to a shared channel so
//! the consumer learns about them while waiting for any chunk, not only the
//! one that failed.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use chunklog_protocol::{LineVerdict, LogChunkInfo, LogLine, TimeRange};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LogError, StoreError};
use crate::store::{ChunkLines, ChunkStore};

/// Receiving end of one spawned fetch.
#[derive(Debug)]
pub(crate) struct PendingChunk {
    key: String,
    body: oneshot::Receiver<Bytes>,
}

pub(crate) struct Prefetcher {
    store: ChunkStore,
    limiter: Arc<Semaphore>,
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
    failures_tx: mpsc::UnboundedSender<LogError>,
    failures_rx: mpsc::UnboundedReceiver<LogError>,
}

impl Prefetcher {
    pub(crate) fn new(store: ChunkStore, concurrency: usize) -> Self {
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            store,
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            shutdown: CancellationToken::new(),
            tasks: JoinSet::new(),
            failures_tx,
            failures_rx,
        }
    }

    /// Spawns the fetch of `chunk`; it is abandoned once `cancel` fires.
    pub(crate) fn spawn(
        &mut self,
        chunk: LogChunkInfo,
        cancel: &CancellationToken,
    ) -> PendingChunk {
        let (tx, rx) = oneshot::channel();
        let pending = PendingChunk {
            key: chunk.key.clone(),
            body: rx,
        };

        let store = self.store.clone();
        let limiter = Arc::clone(&self.limiter);
        let shutdown = self.shutdown.clone();
        let cancel = cancel.clone();
        let failures = self.failures_tx.clone();

        self.tasks.spawn(async move {
            let stopped = async {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = cancel.cancelled() => {}
                }
            };
            tokio::pin!(stopped);

            let _permit = tokio::select! {
                biased;
                _ = &mut stopped => return,
                permit = limiter.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let fetched = tokio::select! {
                biased;
                _ = &mut stopped => return,
                fetched = store.fetch_chunk(&chunk) => fetched,
            };

            match fetched {
                Ok(body) => {
                    // The consumer may have moved on already.
                    let _ = tx.send(body);
                }
                Err(err) => {
                    warn!(key = %chunk.key, error = %err, "chunk fetch failed");
                    let _ = failures.send(err);
                }
            }
        });

        pending
    }

    /// Waits for `pending` to arrive. Fails as soon as cancellation fires or
    /// any fetch of this prefetcher reports an error.
    pub(crate) async fn wait(
        &mut self,
        pending: PendingChunk,
        cancel: &CancellationToken,
    ) -> Result<ChunkLines, LogError> {
        let PendingChunk { key, body } = pending;
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LogError::Cancelled),
            Some(err) = self.failures_rx.recv() => return Err(err),
            received = body => received,
        };

        match received {
            Ok(body) => Ok(ChunkLines::from_bytes(key, body)),
            Err(_) => Err(self.failures_rx.try_recv().unwrap_or_else(|_| {
                LogError::fetch(
                    key,
                    StoreError::Io(io::Error::other("fetch task stopped before delivering the chunk")),
                )
            })),
        }
    }

    /// Stops issuing fetches. In-flight tasks observe it at their next await.
    pub(crate) fn halt(&self) {
        self.shutdown.cancel();
    }

    /// Halts and waits for every spawned task to finish.
    pub(crate) async fn shutdown(&mut self) {
        self.halt();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    warn!(error = %err, "fetch task panicked");
                }
            }
        }
    }
}

/// How far ahead of the consumer chunks are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookahead {
    /// Keep the current window and the next one in flight.
    Windows(usize),
    /// Fetch every relevant chunk up front.
    All,
}

/// In-order line source over chunks downloaded by a [`Prefetcher`].
pub(crate) struct ResidentChunks {
    prefetcher: Prefetcher,
    lookahead: Lookahead,
    range: TimeRange,
    remaining: VecDeque<LogChunkInfo>,
    queue: VecDeque<PendingChunk>,
    source: Option<ChunkLines>,
}

impl ResidentChunks {
    pub(crate) fn new(
        prefetcher: Prefetcher,
        lookahead: Lookahead,
        chunks: VecDeque<LogChunkInfo>,
        range: TimeRange,
    ) -> Self {
        Self {
            prefetcher,
            lookahead,
            range,
            remaining: chunks,
            queue: VecDeque::new(),
            source: None,
        }
    }

    fn refill(&mut self, cancel: &CancellationToken) {
        loop {
            let spawn = match self.lookahead {
                Lookahead::Windows(size) if self.queue.len() <= size => size,
                Lookahead::Windows(_) => return,
                Lookahead::All => self.remaining.len(),
            };
            let spawn = spawn.min(self.remaining.len());
            if spawn == 0 {
                return;
            }

            debug!(chunks = spawn, queued = self.queue.len(), "prefetching chunks");
            for chunk in self.remaining.drain(..spawn) {
                let pending = self.prefetcher.spawn(chunk, cancel);
                self.queue.push_back(pending);
            }
        }
    }

    pub(crate) async fn next_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<LogLine>, LogError> {
        loop {
            if cancel.is_cancelled() {
                return Err(LogError::Cancelled);
            }

            if self.source.is_none() {
                self.refill(cancel);
                let Some(pending) = self.queue.pop_front() else {
                    return Ok(None);
                };
                let lines = self.prefetcher.wait(pending, cancel).await?;
                self.source = Some(lines);
            }
            let Some(source) = self.source.as_mut() else {
                continue;
            };

            match source.next_line().await? {
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

    /// Drops buffered chunks and stops outstanding fetches.
    pub(crate) fn release(&mut self) {
        self.prefetcher.halt();
        self.source = None;
        self.queue.clear();
        self.remaining.clear();
    }

    pub(crate) async fn shutdown(&mut self) {
        self.release();
        self.prefetcher.shutdown().await;
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.queue.len()
    }

    /// True once every spawned fetch task has been joined.
    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.prefetcher.tasks.is_empty()
    }
}
