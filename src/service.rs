use chunklog_core::config::{ChunkLogConfig, IteratorConfig};
use chunklog_core::errors::{ChunkLogError, Result as CoreResult};
use chunklog_iter::{
    merge_logs, open_log, ChunkStore, LogError, LogIterator, LogIteratorReader, ObjectStoreBucket,
    StoreError,
};
use chunklog_protocol::{LogChunkInfo, TimeRange};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Entry point that ties a configured chunk store to an iteration strategy.
#[derive(Debug, Clone)]
pub struct ChunkLog {
    store: ChunkStore,
    iterators: IteratorConfig,
}

impl ChunkLog {
    pub fn new(store: ChunkStore, iterators: IteratorConfig) -> Self {
        Self { store, iterators }
    }

    pub fn from_config(config: &ChunkLogConfig) -> Result<Self, StoreError> {
        let bucket = ObjectStoreBucket::from_config(&config.store)?;
        debug!(
            backend = ?config.store.backend,
            strategy = ?config.iterators.strategy,
            "chunk log configured"
        );
        Ok(Self::new(
            ChunkStore::from_bucket(bucket),
            config.iterators.clone(),
        ))
    }

    /// Loads [`ChunkLogConfig`] from the environment and builds the store.
    pub fn from_env() -> CoreResult<Self> {
        let config = ChunkLogConfig::from_env()?;
        Self::from_config(&config).map_err(|err| ChunkLogError::Config(err.to_string()))
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn iterator_config(&self) -> &IteratorConfig {
        &self.iterators
    }

    /// Opens one log with the configured strategy.
    pub fn open(&self, chunks: Vec<LogChunkInfo>, range: TimeRange) -> Box<dyn LogIterator> {
        open_log(self.store.clone(), chunks, range, &self.iterators)
    }

    /// Opens every log with the configured strategy and merges them by
    /// timestamp.
    pub async fn merge(
        &self,
        logs: Vec<Vec<LogChunkInfo>>,
        range: TimeRange,
        cancel: &CancellationToken,
    ) -> Box<dyn LogIterator> {
        let children = logs
            .into_iter()
            .map(|chunks| self.open(chunks, range))
            .collect();
        merge_logs(children, cancel).await
    }

    /// Byte-stream view over one log.
    pub fn reader(
        &self,
        chunks: Vec<LogChunkInfo>,
        range: TimeRange,
        cancel: CancellationToken,
    ) -> LogIteratorReader<Box<dyn LogIterator>> {
        LogIteratorReader::new(self.open(chunks, range), cancel)
    }

    /// Reads a whole log into memory. The iterator is closed on every path.
    pub async fn read_log(
        &self,
        chunks: Vec<LogChunkInfo>,
        range: TimeRange,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, LogError> {
        let mut reader = self.reader(chunks, range, cancel);
        let mut out = Vec::new();
        let read = reader.read_to_end(&mut out).await;
        let closed = reader.close().await;
        read?;
        closed?;
        Ok(out)
    }
}
