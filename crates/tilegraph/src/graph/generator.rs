//! The capability contract every generator node implements.
//!
//! A [`Generator`] declares its ports and computes its outputs for one chunk at a time
//! through a [`GenContext`]. Generators never touch the chunk directly: inputs arrive
//! already resolved, outputs and sink products are staged in the context and committed by
//! the evaluator only if the pass was not stopped in the meantime.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::coord::{ChunkArea, Coord};
use crate::error::Result;
use crate::graph::port::{InputDef, OutputDef};
use crate::graph::value::{ApplyData, SinkKind, Value};
use crate::matrix::Matrix;
use crate::spatial::SpatialHash;

/// Static description of a generator kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    /// Registry tag used to recreate the node.
    pub tag: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Menu group.
    pub group: &'static str,
    /// Whether the node can be switched off.
    pub disableable: bool,
    /// Set for terminal nodes whose product goes to the backend.
    pub sink: Option<SinkKind>,
    /// At most one node of this kind may exist in a graph.
    pub singleton: bool,
}

impl Descriptor {
    pub const fn new(tag: &'static str, name: &'static str, group: &'static str) -> Self {
        Self {
            tag,
            name,
            group,
            disableable: true,
            sink: None,
            singleton: false,
        }
    }

    pub const fn sink(mut self, kind: SinkKind, singleton: bool) -> Self {
        self.sink = Some(kind);
        self.singleton = singleton;
        self
    }

    pub const fn always_enabled(mut self) -> Self {
        self.disableable = false;
        self
    }
}

/// A node kind in the generator graph.
///
/// `inputs` and `outputs` must return the same definitions for the lifetime of a node
/// value. Layer-configurable generators change them only through a graph edit, which
/// re-reads the definitions and drops links that no longer fit.
pub trait Generator: Any + Send + Sync + fmt::Debug {
    fn descriptor(&self) -> Descriptor;

    fn inputs(&self) -> Vec<InputDef> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<OutputDef> {
        Vec::new()
    }

    /// Compute this node's outputs for the chunk described by `ctx`.
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()>;
}

static NEVER_STOP: fn() -> bool = || false;

/// Per-call view of a chunk handed to [`Generator::generate`].
pub struct GenContext<'a> {
    area: ChunkArea,
    seed: u64,
    inputs: Vec<Option<Value>>,
    outputs: Vec<Option<Value>>,
    product: Option<ApplyData>,
    stop: &'a dyn Fn() -> bool,
}

impl<'a> GenContext<'a> {
    pub(crate) fn new(
        area: ChunkArea,
        seed: u64,
        inputs: Vec<Option<Value>>,
        output_count: usize,
        stop: &'a dyn Fn() -> bool,
    ) -> Self {
        Self {
            area,
            seed,
            inputs,
            outputs: vec![None; output_count],
            product: None,
            stop,
        }
    }

    /// Build a context outside of a chunk, for driving a generator directly.
    pub fn detached(
        area: ChunkArea,
        seed: u64,
        inputs: Vec<Option<Value>>,
        output_count: usize,
    ) -> GenContext<'static> {
        GenContext::new(area, seed, inputs, output_count, &NEVER_STOP)
    }

    pub fn area(&self) -> ChunkArea {
        self.area
    }

    pub fn coord(&self) -> Coord {
        self.area.coord
    }

    /// Deterministic seed for this chunk.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether the chunk asked the pass to stop. Long generators may poll this and return early.
    pub fn is_stopped(&self) -> bool {
        (self.stop)()
    }

    pub fn input(&self, index: usize) -> Option<&Value> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    pub fn input_map(&self, index: usize) -> Option<&Matrix> {
        self.input(index).and_then(Value::as_map).map(Arc::as_ref)
    }

    pub fn input_objects(&self, index: usize) -> Option<&SpatialHash> {
        self.input(index).and_then(Value::as_objects).map(Arc::as_ref)
    }

    /// Take ownership of an input value.
    ///
    /// Inputs declared with `writes_into_source` are private copies, so the returned
    /// matrix can be modified without cloning again.
    pub fn take_input_map(&mut self, index: usize) -> Option<Matrix> {
        match self.inputs.get_mut(index).and_then(Option::take) {
            Some(Value::Map(m)) => Some(Arc::unwrap_or_clone(m)),
            Some(other) => {
                self.inputs[index] = Some(other);
                None
            }
            None => None,
        }
    }

    /// Take ownership of an objects input. See [`GenContext::take_input_map`].
    pub fn take_input_objects(&mut self, index: usize) -> Option<SpatialHash> {
        match self.inputs.get_mut(index).and_then(Option::take) {
            Some(Value::Objects(h)) => Some(Arc::unwrap_or_clone(h)),
            Some(other) => {
                self.inputs[index] = Some(other);
                None
            }
            None => None,
        }
    }

    /// Write the value of output `index`. Writes to unknown ports are ignored.
    pub fn set_output(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.outputs.get_mut(index) {
            *slot = Some(value);
        }
    }

    /// Hand the sink product for this chunk to the apply queue.
    pub fn submit(&mut self, data: ApplyData) {
        self.product = Some(data);
    }

    pub fn output(&self, index: usize) -> Option<&Value> {
        self.outputs.get(index).and_then(Option::as_ref)
    }

    pub fn product(&self) -> Option<&ApplyData> {
        self.product.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Vec<Option<Value>>, Option<ApplyData>) {
        (self.outputs, self.product)
    }
}
