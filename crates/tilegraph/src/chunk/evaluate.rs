//! Recursive, memoized evaluation of the graph for one chunk.
//!
//! Sources are evaluated before the nodes that read them. A node is skipped when its
//! memo stamp is at least as new as the stamps of all its enabled sources, so an edit
//! that invalidates one node re-runs exactly the chain downstream of it. The chunk's
//! `stop` flag is checked before descending, before each `generate` call and again when
//! committing; a stopped pass commits nothing it has not already committed.
use crate::chunk::Chunk;
use crate::config::SessionConfig;
use crate::coord::{seed_for_chunk, ChunkArea, Coord};
use crate::error::{Error, Result};
use crate::graph::generator::GenContext;
use crate::graph::port::{InputRef, OutputRef};
use crate::graph::{Graph, NodeId};

/// Whether an evaluation ran to the end or was cut short by a stop request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Done,
    Stopped,
}

/// Chunk geometry and seed shared by every node of one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassContext {
    pub area: ChunkArea,
    pub seed: u64,
}

impl PassContext {
    pub fn new(coord: Coord, config: &SessionConfig) -> Self {
        Self {
            area: ChunkArea::new(coord, config.chunk_size, config.resolution),
            seed: seed_for_chunk(config.seed, coord),
        }
    }
}

/// Linked, enabled source of each input of `node`.
fn resolved_sources(graph: &Graph, node: NodeId, input_count: usize) -> Vec<Option<OutputRef>> {
    (0..input_count)
        .map(|index| {
            graph
                .source(InputRef::new(node, index))
                .filter(|output| graph.is_enabled(output.node))
        })
        .collect()
}

/// Bring `node` up to date in `chunk`, evaluating its sources first.
pub fn evaluate_recursive(
    graph: &Graph,
    node: NodeId,
    chunk: &Chunk,
    pass: &PassContext,
) -> Result<Flow> {
    if chunk.stop_requested() {
        return Ok(Flow::Stopped);
    }
    let entry = graph.node(node).ok_or(Error::UnknownNode(node))?;
    let sources = resolved_sources(graph, node, entry.inputs().len());

    let mut visited: Vec<NodeId> = Vec::with_capacity(sources.len());
    for source in sources.iter().flatten() {
        if visited.contains(&source.node) {
            continue;
        }
        visited.push(source.node);
        if evaluate_recursive(graph, source.node, chunk, pass)? == Flow::Stopped {
            return Ok(Flow::Stopped);
        }
    }

    let shared = {
        let inner = chunk.lock();
        if inner.flags.stop {
            return Ok(Flow::Stopped);
        }
        if let Some(stamp) = inner.cache.stamp_of(node) {
            let fresh = visited
                .iter()
                .all(|s| inner.cache.stamp_of(*s).is_some_and(|ss| ss <= stamp));
            if fresh {
                return Ok(Flow::Done);
            }
        }
        sources
            .iter()
            .map(|s| s.and_then(|output| inner.cache.result(output).cloned()))
            .collect::<Vec<_>>()
    };

    let mut inputs = Vec::with_capacity(shared.len());
    let mut missing_mandatory = false;
    for (def, value) in entry.inputs().iter().zip(shared) {
        if def.mandatory && value.is_none() {
            missing_mandatory = true;
        }
        inputs.push(match value {
            Some(v) if def.writes_into_source => Some(v.deep_copy()),
            other => other,
        });
    }

    let (outputs, product) = if missing_mandatory {
        (Vec::new(), None)
    } else {
        let stop = || chunk.stop_requested();
        let mut ctx = GenContext::new(pass.area, pass.seed, inputs, entry.outputs().len(), &stop);
        entry.generator().generate(&mut ctx)?;
        ctx.into_parts()
    };

    let mut inner = chunk.lock();
    if inner.flags.stop {
        return Ok(Flow::Stopped);
    }
    let cache = &mut inner.cache;
    cache.results.retain(|output, _| output.node != node);
    for (index, value) in outputs.into_iter().enumerate() {
        if let Some(value) = value {
            cache.results.insert(OutputRef::new(node, index), value);
        }
    }
    let stamp = cache.next_stamp();
    cache.ready.insert(node, stamp);
    match (product, entry.sink()) {
        (Some(product), _) => {
            cache.apply.insert(node, product);
        }
        // A sink that lost its input must not leave an older product applied.
        (None, Some(kind)) => {
            cache.apply.remove(&node);
            cache.vacated.insert(kind);
        }
        (None, None) => {}
    }
    Ok(Flow::Done)
}

/// Regenerate every enabled sink of `graph` in `chunk`.
///
/// Products of sinks that were removed or disabled since the last pass are dropped from
/// the apply queue first.
pub fn run_pass(graph: &Graph, chunk: &Chunk, pass: &PassContext) -> Result<Flow> {
    chunk
        .lock()
        .cache
        .apply
        .retain(|id, _| graph.is_enabled(*id) && graph.node(*id).is_some_and(|n| n.sink().is_some()));

    for sink in graph.enabled_sinks() {
        chunk.lock().cache.invalidate(sink);
        if evaluate_recursive(graph, sink, chunk, pass)? == Flow::Stopped {
            return Ok(Flow::Stopped);
        }
    }
    Ok(Flow::Done)
}
