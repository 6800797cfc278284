// Benchmark comparing the iteration strategies over an in-memory log.
use chrono::{Duration, TimeZone, Utc};
use chunklog::{
    open_log, CancellationToken, ChunkEncoder, ChunkStore, IteratorConfig, IteratorStrategy,
    LogChunkInfo, LogLine, ObjectStoreBucket, TimeRange,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

async fn build_log(bucket: &ObjectStoreBucket, chunks: usize, per_chunk: usize) -> Vec<LogChunkInfo> {
    let mut ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut infos = Vec::with_capacity(chunks);
    for index in 0..chunks {
        let mut encoder = ChunkEncoder::new(format!("bench-{index}"));
        for line in 0..per_chunk {
            encoder
                .push(&LogLine::new(ts, format!("benchmark line {index}/{line}\n")))
                .expect("push");
            ts += Duration::seconds(1);
        }
        let (info, body) = encoder.finish().expect("chunk");
        bucket.put(&info.key, body).await.expect("put");
        infos.push(info);
    }
    infos
}

fn strategy_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let bucket = ObjectStoreBucket::in_memory();
    let chunks = rt.block_on(build_log(&bucket, 64, 256));
    let store = ChunkStore::from_bucket(bucket);

    for strategy in [
        IteratorStrategy::Sequential,
        IteratorStrategy::Batched,
        IteratorStrategy::Parallel,
    ] {
        let config = IteratorConfig {
            strategy,
            ..IteratorConfig::default()
        };
        c.bench_function(&format!("iterate_{strategy:?}").to_lowercase(), |b| {
            b.to_async(&rt).iter(|| async {
                let cancel = CancellationToken::new();
                let mut it = open_log(store.clone(), chunks.clone(), TimeRange::unbounded(), &config);
                let mut lines = 0usize;
                while it.advance(&cancel).await {
                    lines += 1;
                }
                it.close().await.expect("close");
                black_box(lines)
            });
        });
    }
}

criterion_group!(benches, strategy_benchmarks);
criterion_main!(benches);
