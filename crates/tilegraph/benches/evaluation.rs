mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::Vec2;
use tilegraph::chunk::run_pass;
use tilegraph::prelude::*;

const RESOLUTIONS: [usize; 4] = [16, 32, 64, 128];
const CHUNK_SIZE: f32 = 64.0;

/// Noise → blend chain of `depth` stages feeding a height sink.
fn make_chain_graph(depth: usize) -> Graph {
    let mut graph = Graph::new();
    let mut last = graph
        .add(Noise {
            seed: 1,
            ..Noise::default()
        })
        .expect("add noise");
    for i in 0..depth {
        let noise = graph
            .add(Noise {
                seed: 2 + i as u64,
                scale: 20.0 + i as f32 * 7.0,
                ..Noise::default()
            })
            .expect("add noise");
        let weight = graph.add(Constant::new(0.5)).expect("add constant");
        let blend = graph.add(Blend::new(BlendMode::Lerp)).expect("add blend");
        graph
            .link(OutputRef::new(last, 0), InputRef::new(blend, 0))
            .expect("link a");
        graph
            .link(OutputRef::new(noise, 0), InputRef::new(blend, 1))
            .expect("link b");
        graph
            .link(OutputRef::new(weight, 0), InputRef::new(blend, 2))
            .expect("link mask");
        last = blend;
    }
    let height = graph.add(HeightOutput).expect("add height");
    graph
        .link(OutputRef::new(last, 0), InputRef::new(height, 0))
        .expect("link height");
    graph
}

fn run_pass_benches(c: &mut Criterion) {
    let graph = make_chain_graph(4);

    let mut group = c.benchmark_group("evaluation/run_pass");
    for &resolution in &RESOLUTIONS {
        let config = SessionConfig::new(CHUNK_SIZE, resolution);
        let pass = PassContext::new(Coord(3, -2), &config);
        group.throughput(common::elements_throughput(resolution * resolution));

        group.bench_with_input(
            BenchmarkId::new("cold", resolution),
            &resolution,
            |b, _| {
                b.iter_batched(
                    || Chunk::new(Coord(3, -2)),
                    |chunk| {
                        let flow = run_pass(&graph, &chunk, &pass).expect("pass ok");
                        black_box(flow);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn memoized_pass_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation/memoized");
    for depth in [1usize, 4, 16] {
        let graph = make_chain_graph(depth);
        let config = SessionConfig::new(CHUNK_SIZE, 64);
        let pass = PassContext::new(Coord(0, 0), &config);
        let chunk = Chunk::new(Coord(0, 0));
        run_pass(&graph, &chunk, &pass).expect("warm pass ok");

        group.bench_with_input(BenchmarkId::new("all_ready", depth), &depth, |b, _| {
            b.iter(|| {
                let flow = run_pass(&graph, &chunk, &pass).expect("pass ok");
                black_box(flow);
            });
        });
    }
    group.finish();
}

fn session_tick_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation/session_settle");
    for range in [0.0f32, 64.0, 128.0] {
        let config = SessionConfig::new(CHUNK_SIZE, 32)
            .with_generate_range(range)
            .with_multithreading(false)
            .with_apply_steps_per_tick(64);
        let chunks = (2 * config.range_in_chunks() + 1).pow(2) as usize;
        group.throughput(common::elements_throughput(chunks));

        group.bench_with_input(BenchmarkId::new("inline", chunks), &range, |b, _| {
            b.iter_batched(
                || {
                    let graph = make_chain_graph(2);
                    Session::new(config.clone(), graph, MemoryBackend::new()).expect("session")
                },
                |mut session| {
                    let viewpoints = [Vec2::splat(CHUNK_SIZE * 0.5)];
                    loop {
                        session.tick(&viewpoints);
                        if session.is_idle() {
                            break;
                        }
                    }
                    black_box(session.progress());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = run_pass_benches, memoized_pass_benches, session_tick_benches
}
criterion_main!(benches);
