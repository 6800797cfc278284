//! Slow in-memory blob store for the iterator unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use chunklog_protocol::{ChunkEncoder, LogChunkInfo, LogLine};
use futures::StreamExt;

use crate::error::StoreError;
use crate::store::{BlobStore, ByteStream, ChunkStore};

/// Counts `open` calls and tracks how many run at the same time.
#[derive(Debug, Default)]
pub(crate) struct OpenGauge {
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl OpenGauge {
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct Opening<'a>(&'a OpenGauge);

impl<'a> Opening<'a> {
    fn start(gauge: &'a OpenGauge) -> Self {
        gauge.opens.fetch_add(1, Ordering::SeqCst);
        let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for Opening<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SlowBlobs {
    bodies: HashMap<String, Bytes>,
    delay: StdDuration,
    gauge: Arc<OpenGauge>,
}

#[async_trait]
impl BlobStore for SlowBlobs {
    async fn open(&self, key: &str) -> Result<ByteStream, StoreError> {
        let _opening = Opening::start(&self.gauge);
        tokio::time::sleep(self.delay).await;
        let body = self
            .bodies
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(futures::stream::iter([Ok(body)]).boxed())
    }
}

/// Log of `chunks` chunks with `per_chunk` lines each, served after `delay`
/// per open.
pub(crate) async fn slow_log(
    chunks: usize,
    per_chunk: usize,
    delay: StdDuration,
) -> (ChunkStore, Arc<OpenGauge>, Vec<LogChunkInfo>, Vec<LogLine>) {
    let mut ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut bodies = HashMap::new();
    let mut infos = Vec::new();
    let mut lines = Vec::new();
    for index in 0..chunks {
        let mut encoder = ChunkEncoder::new(format!("slow-{index}"));
        for _ in 0..per_chunk {
            let line = LogLine::new(ts, format!("line {}\n", lines.len()));
            encoder.push(&line).expect("push");
            lines.push(line);
            ts += Duration::seconds(30);
        }
        let (info, body) = encoder.finish().expect("chunk");
        bodies.insert(info.key.clone(), Bytes::from(body));
        infos.push(info);
    }

    let gauge = Arc::new(OpenGauge::default());
    let store = ChunkStore::from_bucket(SlowBlobs {
        bodies,
        delay,
        gauge: Arc::clone(&gauge),
    });
    (store, gauge, infos, lines)
}
