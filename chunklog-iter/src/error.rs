use std::io;
use std::sync::Arc;

use chunklog_protocol::CodecError;
use thiserror::Error;

/// Errors raised by a [`BlobStore`](crate::store::BlobStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("object store error: {0}")]
    ObjectStore(#[source] object_store::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StoreError::NotFound(path),
            other => StoreError::ObjectStore(other),
        }
    }
}

/// Terminal condition of a log iterator or stream reader.
///
/// Once an iterator records one of these it is exhausted and keeps reporting
/// the same error, so the type is cheap to clone.
#[derive(Debug, Clone, Error)]
pub enum LogError {
    #[error("failed to fetch chunk {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: Arc<StoreError>,
    },
    #[error("malformed record {record} in chunk {key}: {reason}")]
    Decode {
        key: String,
        record: usize,
        #[source]
        reason: CodecError,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("read past the end of the log stream")]
    ReadPastEnd,
    #[error("failed to close iterator: {message}")]
    Close { message: String },
}

impl LogError {
    pub fn fetch(key: impl Into<String>, source: impl Into<StoreError>) -> Self {
        LogError::Fetch {
            key: key.into(),
            source: Arc::new(source.into()),
        }
    }

    pub fn decode(key: impl Into<String>, record: usize, reason: CodecError) -> Self {
        LogError::Decode {
            key: key.into(),
            record,
            reason,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LogError::Cancelled)
    }

    /// Chunk key the error is attributed to, if any.
    pub fn chunk_key(&self) -> Option<&str> {
        match self {
            LogError::Fetch { key, .. } | LogError::Decode { key, .. } => Some(key),
            _ => None,
        }
    }
}
