use glam::Vec2;
use tilegraph::prelude::*;
use tilegraph_examples::{ascii_height, init_tracing, terrain_graph};
use tracing::info;

fn settle<B: Backend>(session: &mut Session<B>, viewpoints: &[Vec2], sink: &mut VecSink) {
    loop {
        session.tick_with_events(viewpoints, sink);
        if session.is_idle() {
            break;
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SessionConfig::new(32.0, 24)
        .with_generate_range(0.0)
        .with_stock_margin(0)
        .with_multithreading(false);
    let (graph, mask) = terrain_graph(11)?;

    // Records keep structure only; loaded nodes come back with default parameters.
    let registry = GeneratorRegistry::with_builtins();
    let record = graph.to_record();
    let loaded = Graph::from_record(&record, &registry)?;
    info!(
        "Graph record round-trip: {} nodes, {} links.",
        loaded.len(),
        loaded.links().len()
    );

    let backend = MemoryBackend::new();
    let mut session = Session::new(config, graph, backend.clone())?;
    let mut sink = VecSink::only([
        SessionEventKind::ApplyCompleted,
        SessionEventKind::Purged,
    ]);
    let here = [Vec2::splat(16.0)];

    settle(&mut session, &here, &mut sink);
    if let Some(height) = backend.height(Coord(0, 0)) {
        println!("mask 0.35\n{}", ascii_height(&height, 2));
    }

    session.edit_node::<Constant, _>(mask, |c| c.value = 1.0)?;
    settle(&mut session, &here, &mut sink);
    if let Some(height) = backend.height(Coord(0, 0)) {
        println!("mask 1.0\n{}", ascii_height(&height, 2));
    }

    // Dropping the objects sink purges scattered objects from the backend.
    let objects = session
        .graph()
        .nodes()
        .find(|(_, node)| node.sink() == Some(SinkKind::Objects))
        .map(|(id, _)| id);
    if let Some(id) = objects {
        session.remove_node(id)?;
        settle(&mut session, &here, &mut sink);
    }

    let has_objects = backend
        .layers(Coord(0, 0))
        .is_some_and(|layers| layers.objects.is_some());
    info!(
        "{} applies, {} purges; objects left: {}.",
        sink.count(SessionEventKind::ApplyCompleted),
        sink.count(SessionEventKind::Purged),
        has_objects
    );

    Ok(())
}
