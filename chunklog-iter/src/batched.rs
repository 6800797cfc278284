use async_trait::async_trait;
use chunklog_protocol::{LogChunkInfo, LogLine, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::LogError;
use crate::fetch::{Lookahead, Prefetcher, ResidentChunks};
use crate::iterator::{relevant_chunks, IterState, IteratorKind, LogIterator};
use crate::store::ChunkStore;

/// Pipelined iterator: while one window of `batch_size` chunks is being
/// drained, the next window is already downloading.
///
/// At most `batch_size` fetches of one instance run at the same time.
pub struct BatchedIterator {
    chunks: ResidentChunks,
    batch_size: usize,
    state: IterState,
}

impl BatchedIterator {
    /// A `batch_size` of zero is treated as one.
    pub fn new(
        store: ChunkStore,
        chunks: Vec<LogChunkInfo>,
        batch_size: usize,
        range: TimeRange,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            chunks: ResidentChunks::new(
                Prefetcher::new(store, batch_size),
                Lookahead::Windows(batch_size),
                relevant_chunks(chunks, &range),
                range,
            ),
            batch_size,
            state: IterState::default(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl LogIterator for BatchedIterator {
    fn kind(&self) -> IteratorKind {
        IteratorKind::Batched
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if self.state.is_exhausted() {
            return false;
        }

        match self.chunks.next_line(cancel).await {
            Ok(Some(line)) => self.state.emit(line),
            Ok(None) => {
                self.chunks.release();
                self.state.finish()
            }
            Err(err) => {
                warn!(error = %err, batch_size = self.batch_size, "batched iterator stopped");
                self.chunks.release();
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
        self.chunks.shutdown().await;
        if !self.state.is_exhausted() {
            self.state.finish();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectStoreBucket;
    use chrono::{Duration, TimeZone, Utc};
    use crate::testing::slow_log;
    use chunklog_protocol::ChunkEncoder;
    use std::time::Duration as StdDuration;

    async fn put_log(bucket: &ObjectStoreBucket, chunks: usize, per_chunk: usize) -> (Vec<LogChunkInfo>, Vec<LogLine>) {
        let mut ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut infos = Vec::new();
        let mut lines = Vec::new();
        for index in 0..chunks {
            let mut encoder = ChunkEncoder::new(format!("batched-{index}"));
            for _ in 0..per_chunk {
                let line = LogLine::new(ts, format!("line {}\n", lines.len()));
                encoder.push(&line).expect("push");
                lines.push(line);
                ts += Duration::seconds(10);
            }
            let (info, body) = encoder.finish().expect("chunk");
            bucket.put(&info.key, body).await.expect("put");
            infos.push(info);
        }
        (infos, lines)
    }

    #[tokio::test]
    async fn zero_batch_size_is_coerced_to_one() {
        let bucket = ObjectStoreBucket::in_memory();
        let (chunks, lines) = put_log(&bucket, 3, 2).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(
            ChunkStore::from_bucket(bucket),
            chunks,
            0,
            TimeRange::unbounded(),
        );
        assert_eq!(it.batch_size(), 1);
        let mut seen = Vec::new();
        while it.advance(&cancel).await {
            seen.push(it.current().cloned().expect("current"));
        }
        assert_eq!(seen, lines);
        assert!(it.error().is_none());
        it.close().await.expect("close");
    }

    #[tokio::test]
    async fn batch_larger_than_log_preserves_order() {
        let bucket = ObjectStoreBucket::in_memory();
        let (chunks, lines) = put_log(&bucket, 5, 3).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(
            ChunkStore::from_bucket(bucket),
            chunks,
            16,
            TimeRange::unbounded(),
        );
        assert_eq!(it.kind(), IteratorKind::Batched);
        let mut seen = Vec::new();
        while it.advance(&cancel).await {
            seen.push(it.current().cloned().expect("current"));
        }
        assert_eq!(seen, lines);
    }

    #[tokio::test]
    async fn close_mid_stream_drains_prefetches() {
        let bucket = ObjectStoreBucket::in_memory();
        let (chunks, _) = put_log(&bucket, 8, 4).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(
            ChunkStore::from_bucket(bucket),
            chunks,
            2,
            TimeRange::unbounded(),
        );
        assert!(it.advance(&cancel).await);
        it.close().await.expect("close");
        assert!(it.chunks.is_idle());
        assert!(!it.advance(&cancel).await);
        assert!(it.error().is_none());
        it.close().await.expect("second close");
    }

    #[tokio::test]
    async fn cancellation_stops_prefetching() {
        let bucket = ObjectStoreBucket::in_memory();
        let (chunks, _) = put_log(&bucket, 6, 2).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(
            ChunkStore::from_bucket(bucket),
            chunks,
            2,
            TimeRange::unbounded(),
        );
        assert!(it.advance(&cancel).await);
        cancel.cancel();
        assert!(!it.advance(&cancel).await);
        assert!(it.error().is_some_and(LogError::is_cancelled));
        it.close().await.expect("close");
    }

    #[tokio::test]
    async fn fetches_in_flight_never_exceed_batch_size() {
        let (store, gauge, chunks, lines) = slow_log(12, 2, StdDuration::from_millis(5)).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(store, chunks, 3, TimeRange::unbounded());
        let mut served = 0;
        while it.advance(&cancel).await {
            served += 1;
        }
        assert_eq!(served, lines.len());
        assert!(it.error().is_none());
        assert!(gauge.peak() <= 3, "peak was {}", gauge.peak());
        it.close().await.expect("close");
        assert!(it.chunks.is_idle());
    }

    #[tokio::test]
    async fn no_fetch_starts_after_cancellation() {
        let (store, gauge, chunks, _) = slow_log(20, 1, StdDuration::from_millis(20)).await;
        let cancel = CancellationToken::new();

        let mut it = BatchedIterator::new(store, chunks, 2, TimeRange::unbounded());
        assert!(it.advance(&cancel).await);
        cancel.cancel();
        let opened = gauge.opens();

        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert_eq!(gauge.opens(), opened);
        it.close().await.expect("close");
        assert!(it.chunks.is_idle());
    }
}
