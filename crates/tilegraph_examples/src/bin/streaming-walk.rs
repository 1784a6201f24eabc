use std::thread;
use std::time::Duration;

use glam::Vec2;
use tilegraph::prelude::*;
use tilegraph_examples::{ascii_coverage, ascii_height, init_tracing, terrain_graph};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SessionConfig::new(32.0, 32)
        .with_generate_range(48.0)
        .with_stock_margin(1)
        .with_max_threads(3)
        .with_seed(2025);
    let chunk_size = config.chunk_size;
    let (graph, _) = terrain_graph(7)?;
    let backend = MemoryBackend::new().with_rows_per_step(4);
    let mut session = Session::new(config, graph, backend.clone())?;

    let mut sink = VecSink::only([
        SessionEventKind::ChunkCreated,
        SessionEventKind::ChunkRelocated,
        SessionEventKind::ChunkRetired,
        SessionEventKind::GenerationFailed,
    ]);

    // Walk diagonally across the world, a quarter chunk per tick.
    let mut viewpoint = Vec2::splat(chunk_size * 0.5);
    let step = Vec2::splat(chunk_size * 0.25);
    for _ in 0..60 {
        session.tick_with_events(&[viewpoint], &mut sink);
        viewpoint += step;
        thread::sleep(Duration::from_millis(5));
    }
    while !session.is_idle() {
        session.tick_with_events(&[viewpoint], &mut sink);
        thread::sleep(Duration::from_millis(1));
    }

    info!(
        "Walk finished after {} ticks: {} created, {} relocated, {} retired, {} failed.",
        session.ticks(),
        sink.count(SessionEventKind::ChunkCreated),
        sink.count(SessionEventKind::ChunkRelocated),
        sink.count(SessionEventKind::ChunkRetired),
        sink.count(SessionEventKind::GenerationFailed),
    );
    let stats = backend.stats();
    info!(
        "Backend: {} applies in {} steps, {} releases.",
        stats.applies, stats.steps, stats.releases
    );

    let center = Coord::from_world(viewpoint, chunk_size);
    let view = CoordRect::around(center, 4);
    println!(
        "{}",
        ascii_coverage(view, &session.coords(), &backend.coords())
    );
    if let Some(height) = backend.height(center) {
        println!("{}", ascii_height(&height, 2));
    }

    Ok(())
}
