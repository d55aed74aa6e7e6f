//! Benchmarks for prediction-tree expansion and ranking.
//!
//! Expansion cost grows as `top_k^max_depth` inference calls, each over the
//! full prefix. These benchmarks show that growth and compare sequential
//! against level-parallel traversal.
//!
//! # Results Interpretation
//!
//! - Lower is better for time benchmarks
//! - Throughput is reported in inference calls
//! - `rank/*` isolates the softmax + top-k cost per call

use arbor_core::model::FnEngine;
use arbor_core::search::{estimated_calls, ExpanderConfig, Ranker, Traversal, TreeExpander};
use arbor_core::tree::{PredictionTree, SeedAnchor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Vocabulary size used by the synthetic model.
const VOCAB: usize = 4096;

/// Deterministic pseudo-random logits keyed on the last token.
fn synthetic_logits(prefix: &[u32]) -> Vec<f32> {
    let seed = prefix.last().copied().unwrap_or(0) as u64;
    (0..VOCAB as u64)
        .map(|t| {
            let x = (t ^ seed).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            (x >> 40) as f32 / (1u64 << 24) as f32 * 8.0
        })
        .collect()
}

fn prompt() -> Vec<u32> {
    (0..32).collect()
}

fn bench_branching(c: &mut Criterion) {
    let engine = FnEngine::new(VOCAB, synthetic_logits);
    let mut group = c.benchmark_group("expand/branching");

    for top_k in [1usize, 2, 3] {
        let max_depth = 4;
        group.throughput(Throughput::Elements(estimated_calls(top_k, max_depth)));
        group.bench_with_input(BenchmarkId::from_parameter(top_k), &top_k, |b, &top_k| {
            let expander = TreeExpander::new(
                &engine,
                ExpanderConfig {
                    top_k,
                    max_depth,
                    ..Default::default()
                },
            );
            b.iter(|| {
                let (mut tree, leaf) = PredictionTree::seed_from_tokens(&prompt(), SeedAnchor::Leaf);
                black_box(expander.expand(&mut tree, leaf).unwrap());
                tree
            });
        });
    }

    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let engine = FnEngine::new(VOCAB, synthetic_logits);
    let mut group = c.benchmark_group("expand/traversal");
    group.throughput(Throughput::Elements(estimated_calls(3, 4)));

    for traversal in [Traversal::DepthFirst, Traversal::BreadthFirst, Traversal::Parallel] {
        let expander = TreeExpander::new(
            &engine,
            ExpanderConfig {
                top_k: 3,
                max_depth: 4,
                traversal,
                ..Default::default()
            },
        );
        group.bench_function(format!("{:?}", traversal), |b| {
            b.iter(|| {
                let (mut tree, leaf) = PredictionTree::seed_from_tokens(&prompt(), SeedAnchor::Leaf);
                black_box(expander.expand(&mut tree, leaf).unwrap());
                tree
            });
        });
    }

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let logits = synthetic_logits(&[7]);
    let ranker = Ranker::new(VOCAB);
    let mut group = c.benchmark_group("rank");

    for top_k in [1usize, 5, 0] {
        group.bench_with_input(BenchmarkId::from_parameter(top_k), &top_k, |b, &top_k| {
            b.iter(|| ranker.rank(black_box(&logits), top_k).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_branching, bench_traversal, bench_rank);
criterion_main!(benches);
