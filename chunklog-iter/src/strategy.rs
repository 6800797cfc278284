use chunklog_core::config::{IteratorConfig, IteratorStrategy};
use chunklog_protocol::{LogChunkInfo, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::batched::BatchedIterator;
use crate::iterator::LogIterator;
use crate::merging::MergingIterator;
use crate::parallel::ParallelIterator;
use crate::sequential::SequentialIterator;
use crate::store::ChunkStore;

/// Opens one log with the strategy selected in `config`.
pub fn open_log(
    store: ChunkStore,
    chunks: Vec<LogChunkInfo>,
    range: TimeRange,
    config: &IteratorConfig,
) -> Box<dyn LogIterator> {
    debug!(strategy = ?config.strategy, chunks = chunks.len(), "opening log");
    match config.strategy {
        IteratorStrategy::Sequential => Box::new(SequentialIterator::new(store, chunks, range)),
        IteratorStrategy::Batched => Box::new(BatchedIterator::new(
            store,
            chunks,
            config.batch_size,
            range,
        )),
        IteratorStrategy::Parallel => Box::new(
            ParallelIterator::new(store, chunks, range).with_workers(config.parallel_workers),
        ),
    }
}

/// Merges already opened logs by timestamp.
pub async fn merge_logs(
    children: Vec<Box<dyn LogIterator>>,
    cancel: &CancellationToken,
) -> Box<dyn LogIterator> {
    Box::new(MergingIterator::new(children, cancel).await)
}
