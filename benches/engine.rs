use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dubweave::exec::{ResourceGate, WorkPool};
use dubweave::transcript::{Chunk, ChunkPlan, ChunkStitcher, Cue};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

/// Chunks covering `minutes` of audio, one cue every 3s, with overlap duplicates.
fn transcript_chunks(minutes: u64) -> Vec<Chunk> {
    let plan = ChunkPlan::new(Duration::from_secs(60), Duration::from_secs(2));
    plan.windows(Duration::from_secs(minutes * 60))
        .expect("valid plan")
        .iter()
        .map(|window| {
            let cues = (0..window.duration.as_secs() / 3)
                .map(|i| {
                    let start = i as f64 * 3.0 + 0.25;
                    Cue::from_secs(i as usize, start, start + 2.5, format!("line {}", i))
                })
                .collect();
            Chunk::from_window(window, cues)
        })
        .collect()
}

fn bench_stitcher(c: &mut Criterion) {
    let stitcher = ChunkStitcher::new();
    let mut group = c.benchmark_group("stitch");
    for minutes in [10u64, 60, 180] {
        let chunks = transcript_chunks(minutes);
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &chunks, |b, chunks| {
            b.iter(|| stitcher.stitch(black_box(chunks.clone())).expect("stitch"))
        });
    }
    group.finish();
}

fn bench_pool_overhead(c: &mut Criterion) {
    let items: Vec<u64> = (0..1_000).collect();
    let mut group = c.benchmark_group("pool");
    for workers in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("ungated", workers),
            &workers,
            |b, &workers| {
                let pool = WorkPool::new(workers);
                b.iter(|| {
                    pool.run(items.clone(), |item| Ok(black_box(item.payload) * 2))
                        .expect("pool run")
                })
            },
        );
        group.bench_with_input(BenchmarkId::new("gated", workers), &workers, |b, &workers| {
            let pool = WorkPool::new(workers).with_gate(Arc::new(ResourceGate::new("bench", 2)));
            b.iter(|| {
                pool.run(items.clone(), |item| Ok(black_box(item.payload) * 2))
                    .expect("pool run")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stitcher, bench_pool_overhead);
criterion_main!(benches);
