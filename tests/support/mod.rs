// Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, DurationRound, Utc};
use chunklog::{
    BatchedIterator, ChunkEncoder, ChunkStore, IteratorStrategy, LogChunkInfo, LogIterator,
    LogLine, ObjectStoreBucket, ParallelIterator, SequentialIterator, TimeRange,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random alphanumeric payload of `length` characters.
pub fn random_payload(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
}

/// Writes a log of `size` random lines split into chunks of `chunk_size`.
///
/// Lines are one minute apart and consecutive chunks are one hour apart.
pub async fn create_log(
    bucket: &ObjectStoreBucket,
    size: usize,
    chunk_size: usize,
) -> anyhow::Result<(Vec<LogChunkInfo>, Vec<LogLine>)> {
    anyhow::ensure!(chunk_size > 0, "chunk_size must be at least 1");
    let mut chunks = Vec::new();
    let mut lines = Vec::with_capacity(size);
    let mut ts = now();

    let mut remaining = size;
    loop {
        let mut encoder = ChunkEncoder::new(uuid::Uuid::new_v4().simple().to_string());
        for _ in 0..chunk_size.min(remaining) {
            let line = LogLine::new(ts, format!("{}\n", random_payload(100)));
            encoder.push(&line)?;
            lines.push(line);
            ts += Duration::minutes(1);
        }
        remaining -= encoder.num_lines();

        if let Some((info, body)) = encoder.finish() {
            bucket.put(&info.key, body).await?;
            chunks.push(info);
        }
        ts += Duration::hours(1);

        if remaining == 0 {
            break;
        }
    }

    Ok((chunks, lines))
}

/// Range covering the whole log.
pub fn complete_range(chunks: &[LogChunkInfo]) -> TimeRange {
    match chunks.last() {
        Some(last) => TimeRange::until(last.end),
        None => TimeRange::unbounded(),
    }
}

pub fn open(
    strategy: IteratorStrategy,
    store: &ChunkStore,
    chunks: &[LogChunkInfo],
    range: TimeRange,
) -> Box<dyn LogIterator> {
    match strategy {
        IteratorStrategy::Sequential => Box::new(SequentialIterator::new(
            store.clone(),
            chunks.to_vec(),
            range,
        )),
        IteratorStrategy::Batched => Box::new(BatchedIterator::new(
            store.clone(),
            chunks.to_vec(),
            2,
            range,
        )),
        IteratorStrategy::Parallel => Box::new(ParallelIterator::new(
            store.clone(),
            chunks.to_vec(),
            range,
        )),
    }
}
