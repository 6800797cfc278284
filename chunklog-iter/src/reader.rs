//! Byte-stream view over a [`LogIterator`].

use bytes::{Buf, Bytes};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LogError;
use crate::iterator::LogIterator;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Streaming,
    /// End of stream has been returned to the caller once.
    EndReported,
}

/// Concatenates the data of every line produced by an iterator into a byte
/// stream. A line that does not fit into the caller's buffer is split, and
/// its remainder is returned first by the next call.
pub struct LogIteratorReader<I> {
    iter: I,
    cancel: CancellationToken,
    leftover: Bytes,
    state: ReadState,
}

impl<I: LogIterator> LogIteratorReader<I> {
    pub fn new(iter: I, cancel: CancellationToken) -> Self {
        Self {
            iter,
            cancel,
            leftover: Bytes::new(),
            state: ReadState::Streaming,
        }
    }

    pub fn get_ref(&self) -> &I {
        &self.iter
    }

    /// Fills `buf` with as many bytes as are available.
    ///
    /// Returns `Ok(Some(n))` with the number of bytes copied, `Ok(None)` once
    /// at the end of the stream, and [`LogError::ReadPastEnd`] on every call
    /// after that. An iterator failure is returned in place of the end of the
    /// stream, once the bytes copied by this call have been returned.
    /// Cancellation wins over any buffered or already copied bytes. An empty `buf`
    /// yields `Ok(Some(0))` while data remains.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<Option<usize>, LogError> {
        if self.cancel.is_cancelled() {
            return Err(LogError::Cancelled);
        }
        if self.state == ReadState::EndReported {
            return Err(LogError::ReadPastEnd);
        }

        let mut written = 0;
        loop {
            if !self.leftover.is_empty() {
                let n = self.leftover.len().min(buf.len() - written);
                self.leftover.copy_to_slice(&mut buf[written..written + n]);
                written += n;
                if written == buf.len() {
                    return Ok(Some(written));
                }
                continue;
            }

            if self.iter.advance(&self.cancel).await {
                if let Some(line) = self.iter.current() {
                    self.leftover = Bytes::copy_from_slice(line.data.as_bytes());
                }
                continue;
            }

            let cancelled = self.cancel.is_cancelled()
                || self.iter.error().is_some_and(LogError::is_cancelled);
            if cancelled {
                return Err(LogError::Cancelled);
            }
            if written > 0 {
                return Ok(Some(written));
            }
            return match self.iter.error() {
                Some(err) => Err(err.clone()),
                None => {
                    debug!(kind = %self.iter.kind(), "log stream finished");
                    self.state = ReadState::EndReported;
                    Ok(None)
                }
            };
        }
    }

    /// Reads the rest of the stream into `out`, returning the number of bytes
    /// appended.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize, LogError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut total = 0;
        while let Some(n) = self.read(&mut chunk).await? {
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
        Ok(total)
    }

    /// Closes the underlying iterator.
    pub async fn close(&mut self) -> Result<(), LogError> {
        self.leftover.clear();
        self.iter.close().await
    }

    pub fn into_inner(self) -> I {
        self.iter
    }
}
