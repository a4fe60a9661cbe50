//! Benchmarks for the CPU-bound pipeline stages: chunking and ranking.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use docpipe::models::{Chunk, ChunkingConfig};
use docpipe::services::{TextChunker, rank_candidates};

const DIMENSION: usize = 768;

/// Deterministic pseudo-random unit-ish vector, no rand dependency.
fn vector(seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..DIMENSION)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.5
        })
        .collect()
}

fn synthetic_text(chars: usize) -> String {
    let sentence = "The quarterly report covers revenue, costs and staffing levels. ";
    sentence.repeat(chars / sentence.len() + 1)[..chars].to_string()
}

fn candidates(count: usize) -> Vec<Chunk> {
    (0..count)
        .map(|i| {
            let mut chunk = Chunk::new("bench-doc", i as u32, format!("chunk {}", i), 0, 64, 16);
            chunk.embedding = vector(i as u64 + 1);
            chunk
        })
        .collect()
}

fn bench_chunking(c: &mut Criterion) {
    let chunker = TextChunker::new(&ChunkingConfig::default()).unwrap();
    let mut group = c.benchmark_group("chunking");

    for chars in [10_000, 100_000, 1_000_000] {
        let text = synthetic_text(chars);
        group.bench_with_input(BenchmarkId::new("chunk", chars), &text, |b, text| {
            b.iter(|| chunker.chunk("bench-doc", text));
        });
    }

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let query = vector(0);
    let mut group = c.benchmark_group("ranking");

    for count in [100, 1_000, 10_000] {
        let pool = candidates(count);
        group.bench_with_input(BenchmarkId::new("rank", count), &pool, |b, pool| {
            b.iter(|| rank_candidates(&query, pool, 5, 0.0));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunking, bench_ranking);
criterion_main!(benches);
