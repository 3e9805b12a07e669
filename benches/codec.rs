//! Benchmarks for FB2 decoding and encoding.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use fictionbook::{decode, encode};

const SAMPLE: &[u8] = include_bytes!("../tests/fixtures/sample.fb2");

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.bench_function("strict", |b| b.iter(|| decode(black_box(SAMPLE), true).unwrap()));
    group.bench_function("lenient", |b| b.iter(|| decode(black_box(SAMPLE), false).unwrap()));
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let book = decode(SAMPLE, true).unwrap();

    let mut group = c.benchmark_group("encode");
    group.bench_function("compact", |b| b.iter(|| encode(black_box(&book), false).unwrap()));
    group.bench_function("pretty", |b| b.iter(|| encode(black_box(&book), true).unwrap()));
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
