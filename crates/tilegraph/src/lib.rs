#![forbid(unsafe_code)]
//! tilegraph: Incremental, graph-driven procedural generation over a streamed tile grid.
//!
//! Modules:
//! - graph: generator nodes, typed ports, links, registry and persisted records
//! - generators: built-in map, scatter and output kinds
//! - chunk: per-tile caches, recursive memoized evaluation and background workers
//! - grid: viewpoint-driven deploy, relocation, nailing and retirement of chunks
//! - session: the per-tick driver tying graph, grid, workers and backend together
//! - spatial: bucketed point index for proximity queries
//!
//! For examples, see the `tilegraph_examples` crate.
pub mod backend;
pub mod chunk;
pub mod config;
pub mod coord;
pub mod error;
pub mod events;
pub mod generators;
pub mod graph;
pub mod grid;
pub mod matrix;
pub mod session;
pub mod spatial;

/// Convenient re-exports for common types. Import with `use tilegraph::prelude::*;`.
pub mod prelude {
    pub use crate::backend::{AppliedLayers, ApplyTask, Backend, BackendStats, MemoryBackend, Step};
    pub use crate::chunk::{Chunk, ChunkFlags, ChunkState, Flow, PassContext};
    pub use crate::config::SessionConfig;
    pub use crate::coord::{seed_for_chunk, ChunkArea, Coord, CoordRect};
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        EventSink, FnSink, MultiSink, SessionEvent, SessionEventKind, VecSink,
    };
    pub use crate::generators::{
        Blend, BlendMode, Constant, HeightOutput, Noise, ObjectsOutput, Scatter, TexturesOutput,
    };
    pub use crate::graph::generator::{Descriptor, GenContext, Generator};
    pub use crate::graph::port::{InputDef, InputRef, OutputDef, OutputRef, PortType};
    pub use crate::graph::registry::GeneratorRegistry;
    pub use crate::graph::value::{ApplyData, SinkKind, Value};
    pub use crate::graph::{Graph, GraphRecord, LinkRecord, NodeId, NodeRecord, SharedGraph};
    pub use crate::grid::{ChunkGrid, DeployReport, GridLifecycle};
    pub use crate::matrix::Matrix;
    pub use crate::session::{Progress, Session};
    pub use crate::spatial::{SpatialHash, SpatialObject};
}
