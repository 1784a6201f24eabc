#![forbid(unsafe_code)]
//! Shared helpers for the tilegraph example binaries.
use std::fmt::Write as _;

use tilegraph::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a console subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}

const RAMP: &[u8] = b" .:-=+*#%@";

/// Render a heightfield as ASCII, one character per `step` cells.
pub fn ascii_height(matrix: &Matrix, step: usize) -> String {
    let step = step.max(1);
    let resolution = matrix.resolution();
    let (lo, hi) = matrix.min_max().unwrap_or((0.0, 1.0));
    let span = (hi - lo).max(f32::EPSILON);

    let mut out = String::new();
    for iz in (0..resolution).step_by(step) {
        for ix in (0..resolution).step_by(step) {
            let v = (matrix.get(ix as isize, iz as isize) - lo) / span;
            let i = ((v * (RAMP.len() - 1) as f32).round() as usize).min(RAMP.len() - 1);
            out.push(RAMP[i] as char);
        }
        out.push('\n');
    }
    out
}

/// Render which coordinates in `rect` hold applied data: `#` applied, `o` deployed only.
pub fn ascii_coverage(rect: CoordRect, deployed: &[Coord], applied: &[Coord]) -> String {
    let mut out = String::new();
    for z in rect.min.1..=rect.max.1 {
        for x in rect.min.0..=rect.max.0 {
            let coord = Coord(x, z);
            let c = if applied.contains(&coord) {
                '#'
            } else if deployed.contains(&coord) {
                'o'
            } else {
                '.'
            };
            out.push(c);
        }
        let _ = writeln!(out);
    }
    out
}

/// A small terrain graph: two noise layers blended under a mask, with scattered rocks.
///
/// Returns the graph and the id of the mask constant.
pub fn terrain_graph(seed: u64) -> Result<(Graph, NodeId)> {
    let mut graph = Graph::new();
    let hills = graph.add(Noise {
        seed,
        scale: 60.0,
        octaves: 4,
        ..Noise::default()
    })?;
    let detail = graph.add(Noise {
        seed: seed.wrapping_add(1),
        scale: 12.0,
        amplitude: 0.3,
        ..Noise::default()
    })?;
    let mask = graph.add(Constant::new(0.35))?;
    let blend = graph.add(Blend::new(BlendMode::Add))?;
    graph.link(OutputRef::new(hills, 0), InputRef::new(blend, 0))?;
    graph.link(OutputRef::new(detail, 0), InputRef::new(blend, 1))?;
    graph.link(OutputRef::new(mask, 0), InputRef::new(blend, 2))?;

    let height = graph.add(HeightOutput)?;
    graph.link(OutputRef::new(blend, 0), InputRef::new(height, 0))?;

    let rocks = graph.add(Scatter::new(24, 3.0))?;
    graph.link(OutputRef::new(detail, 0), InputRef::new(rocks, 0))?;
    let objects = graph.add(ObjectsOutput)?;
    graph.link(OutputRef::new(rocks, 0), InputRef::new(objects, 0))?;

    Ok((graph, mask))
}
