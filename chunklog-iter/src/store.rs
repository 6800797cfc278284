//! Chunk store adapter.
//!
//! [`BlobStore`] is the boundary to the external key → bytes storage.
//! [`ChunkStore`] turns a chunk's key into decoded [`LogLine`]s, either
//! streaming straight from the store ([`ChunkStore::open_chunk`]) or from a
//! body already resident in memory ([`ChunkStore::fetch_chunk`] followed by
//! [`ChunkLines::from_bytes`]).

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chunklog_core::config::{StoreBackend, StoreConfig};
use chunklog_protocol::{decode_record, LogChunkInfo, LogLine};
use futures::io::{AsyncBufRead, AsyncBufReadExt, Cursor};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::debug;

use crate::error::{LogError, StoreError};

/// Byte stream of one blob.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Read access to the external blob store. Implementations must be safe for
/// concurrent reads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn open(&self, key: &str) -> Result<ByteStream, StoreError>;
}

/// [`BlobStore`] backed by an [`ObjectStore`], with an optional key prefix.
#[derive(Clone)]
pub struct ObjectStoreBucket {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl fmt::Debug for ObjectStoreBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreBucket")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStoreBucket {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn local(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let store = LocalFileSystem::new_with_prefix(path)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// S3 bucket; credentials are taken from the standard AWS environment.
    pub fn s3(bucket: &str, region: &str) -> Result<Self, StoreError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|err| StoreError::Config(format!("failed to create S3 store: {err}")))?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let bucket = match &config.backend {
            StoreBackend::InMemory => Self::in_memory(),
            StoreBackend::Local { path } => Self::local(path)?,
            StoreBackend::S3 { bucket, region } => Self::s3(bucket, region)?,
        };
        Ok(match &config.prefix {
            Some(prefix) => bucket.with_prefix(prefix),
            None => bucket,
        })
    }

    /// View of the same store with every key placed under `prefix`.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        Self {
            store: Arc::clone(&self.store),
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn path_for(&self, key: &str) -> ObjectPath {
        match &self.prefix {
            Some(prefix) => ObjectPath::from(format!("{prefix}/{key}")),
            None => ObjectPath::from(key),
        }
    }

    /// Writes a blob. Ingestion-side helper; iterators only read.
    pub async fn put(&self, key: &str, body: impl Into<Bytes>) -> Result<(), StoreError> {
        let body: Bytes = body.into();
        self.store.put(&self.path_for(key), body.into()).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBucket {
    async fn open(&self, key: &str) -> Result<ByteStream, StoreError> {
        let result = self.store.get(&self.path_for(key)).await?;
        Ok(result.into_stream().map_err(StoreError::from).boxed())
    }
}

/// Opens chunks from a [`BlobStore`] and decodes them into lines.
#[derive(Clone)]
pub struct ChunkStore {
    bucket: Arc<dyn BlobStore>,
}

impl fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStore").finish_non_exhaustive()
    }
}

impl ChunkStore {
    pub fn new(bucket: Arc<dyn BlobStore>) -> Self {
        Self { bucket }
    }

    pub fn from_bucket<B: BlobStore + 'static>(bucket: B) -> Self {
        Self::new(Arc::new(bucket))
    }

    /// Opens a chunk and decodes it lazily while it streams in.
    pub async fn open_chunk(&self, chunk: &LogChunkInfo) -> Result<ChunkLines, LogError> {
        debug!(key = %chunk.key, lines = chunk.num_lines, "opening chunk");
        let stream = self
            .bucket
            .open(&chunk.key)
            .await
            .map_err(|err| LogError::fetch(&chunk.key, err))?;
        let reader = stream.map_err(io::Error::other).into_async_read();
        Ok(ChunkLines::new(chunk.key.clone(), Box::new(reader)))
    }

    /// Reads a whole chunk body into memory.
    pub async fn fetch_chunk(&self, chunk: &LogChunkInfo) -> Result<Bytes, LogError> {
        debug!(key = %chunk.key, lines = chunk.num_lines, "fetching chunk");
        let mut stream = self
            .bucket
            .open(&chunk.key)
            .await
            .map_err(|err| LogError::fetch(&chunk.key, err))?;

        let mut body = BytesMut::new();
        while let Some(part) = stream
            .try_next()
            .await
            .map_err(|err| LogError::fetch(&chunk.key, err))?
        {
            body.extend_from_slice(&part);
        }
        Ok(body.freeze())
    }
}

/// Lazy sequence of decoded lines from one chunk.
pub struct ChunkLines {
    key: String,
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    buf: Vec<u8>,
    record: usize,
}

impl ChunkLines {
    fn new(key: String, reader: Box<dyn AsyncBufRead + Send + Unpin>) -> Self {
        Self {
            key,
            reader,
            buf: Vec::new(),
            record: 0,
        }
    }

    /// Decodes a chunk body that is already in memory.
    pub fn from_bytes(key: impl Into<String>, body: Bytes) -> Self {
        Self::new(key.into(), Box::new(Cursor::new(body)))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next decoded line, or `None` once the chunk is exhausted.
    pub async fn next_line(&mut self) -> Result<Option<LogLine>, LogError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|err| LogError::fetch(&self.key, err))?;
        if read == 0 {
            return Ok(None);
        }

        let record = self.record;
        self.record += 1;
        decode_record(&self.buf)
            .map(Some)
            .map_err(|reason| LogError::decode(&self.key, record, reason))
    }
}
