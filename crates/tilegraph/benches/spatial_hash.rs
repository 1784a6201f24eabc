mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tilegraph::prelude::*;

const OBJECT_COUNTS: [usize; 4] = [100, 1_000, 10_000, 50_000];
const REGION: f32 = 512.0;
const QUERIES: usize = 1_000;

fn rand01(rng: &mut StdRng) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}

fn random_points(rng: &mut StdRng, count: usize) -> Vec<Vec2> {
    (0..count)
        .map(|_| Vec2::new(rand01(rng), rand01(rng)) * REGION)
        .collect()
}

fn make_hash(count: usize) -> SpatialHash {
    let mut rng = StdRng::seed_from_u64(7);
    let resolution = ((count as f32).sqrt() as usize).clamp(1, 64);
    let mut hash = SpatialHash::new(Vec2::ZERO, REGION, resolution);
    for p in random_points(&mut rng, count) {
        hash.add(hash.clamp(p), 0.0, 0.0, 1.0);
    }
    hash
}

fn range_benches(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(99);
    let queries = random_points(&mut rng, QUERIES);

    let mut group = c.benchmark_group("spatial_hash/objs_in_range");
    group.throughput(common::elements_throughput(QUERIES));
    for &count in &OBJECT_COUNTS {
        let hash = make_hash(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut hits = 0usize;
                for &p in &queries {
                    hits += hash.objs_in_range(black_box(p), 8.0).len();
                }
                black_box(hits);
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("spatial_hash/is_any_obj_in_range");
    group.throughput(common::elements_throughput(QUERIES));
    for &count in &OBJECT_COUNTS {
        let hash = make_hash(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let hits = queries
                    .iter()
                    .filter(|&&p| hash.is_any_obj_in_range(black_box(p), 8.0))
                    .count();
                black_box(hits);
            });
        });
    }
    group.finish();
}

fn closest_benches(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let queries = random_points(&mut rng, QUERIES);

    let mut group = c.benchmark_group("spatial_hash/closest");
    group.throughput(common::elements_throughput(QUERIES));
    for &count in &OBJECT_COUNTS {
        let hash = make_hash(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut total = 0.0f32;
                for &p in &queries {
                    total += hash.min_distance(black_box(p)).unwrap_or(0.0);
                }
                black_box(total);
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = range_benches, closest_benches
}
criterion_main!(benches);
