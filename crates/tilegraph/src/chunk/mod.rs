//! Per-tile generation context.
//!
//! A [`Chunk`] is a cheap, cloneable handle to one tile's state: its coordinate, the
//! life-cycle [`ChunkFlags`], and a [`ChunkCache`] with the memo stamps, cached output
//! values and queued sink products. Everything lives behind a single mutex shared by the
//! chunk's worker and the session driver; the lock is never held while a generator runs.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::coord::Coord;
use crate::graph::port::OutputRef;
use crate::graph::value::{ApplyData, SinkKind, Value};
use crate::graph::NodeId;

pub mod evaluate;
pub mod state;
pub mod worker;

pub use evaluate::{evaluate_recursive, run_pass, Flow, PassContext};
pub use state::{ChunkFlags, ChunkState};

/// Memoized results of one chunk.
#[derive(Debug, Default)]
pub struct ChunkCache {
    /// Nodes whose outputs are current, with the stamp of their last commit.
    pub(crate) ready: HashMap<NodeId, u64>,
    pub(crate) results: HashMap<OutputRef, Value>,
    /// Sink products waiting for apply, keyed by sink node.
    pub(crate) apply: BTreeMap<NodeId, ApplyData>,
    /// Sink kinds whose last pass produced nothing. Rolled back on the backend at the next apply.
    pub(crate) vacated: BTreeSet<SinkKind>,
    stamp: u64,
}

impl ChunkCache {
    pub(crate) fn next_stamp(&mut self) -> u64 {
        self.stamp += 1;
        self.stamp
    }

    pub fn is_ready(&self, node: NodeId) -> bool {
        self.ready.contains_key(&node)
    }

    pub fn stamp_of(&self, node: NodeId) -> Option<u64> {
        self.ready.get(&node).copied()
    }

    pub fn result(&self, output: OutputRef) -> Option<&Value> {
        self.results.get(&output)
    }

    /// Forget a node's memo entry and cached outputs.
    pub fn invalidate(&mut self, node: NodeId) {
        self.ready.remove(&node);
        self.results.retain(|output, _| output.node != node);
    }

    /// Drop memo entries and cached outputs. Queued products are kept.
    pub fn clear_results(&mut self) {
        self.ready.clear();
        self.results.clear();
    }

    /// Drop everything, including queued products.
    pub fn clear(&mut self) {
        self.clear_results();
        self.apply.clear();
        self.vacated.clear();
    }

    /// Whether products or roll-backs are waiting for apply.
    pub fn has_products(&self) -> bool {
        !self.apply.is_empty() || !self.vacated.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct ChunkInner {
    pub(crate) coord: Coord,
    pub(crate) flags: ChunkFlags,
    pub(crate) cache: ChunkCache,
    /// Tick at which a failed chunk is started again.
    pub(crate) retry_at: Option<u64>,
}

/// Shared handle to one tile's generation state.
#[derive(Clone)]
pub struct Chunk(Arc<Mutex<ChunkInner>>);

impl Chunk {
    pub fn new(coord: Coord) -> Self {
        Self(Arc::new(Mutex::new(ChunkInner {
            coord,
            flags: ChunkFlags::default(),
            cache: ChunkCache::default(),
            retry_at: None,
        })))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChunkInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the same chunk.
    pub fn same(&self, other: &Chunk) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn coord(&self) -> Coord {
        self.lock().coord
    }

    pub fn flags(&self) -> ChunkFlags {
        self.lock().flags
    }

    pub fn state(&self) -> ChunkState {
        let inner = self.lock();
        inner.flags.state(inner.cache.has_products())
    }

    pub fn is_complete(&self) -> bool {
        self.lock().flags.complete
    }

    pub fn is_ready(&self, node: NodeId) -> bool {
        self.lock().cache.is_ready(node)
    }

    /// Cached value of an output port.
    pub fn result(&self, output: OutputRef) -> Option<Value> {
        self.lock().cache.result(output).cloned()
    }

    /// Run `f` with the chunk's cache locked.
    pub fn with_cache<R>(&self, f: impl FnOnce(&ChunkCache) -> R) -> R {
        f(&self.lock().cache)
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().flags.stop
    }

    /// Ask for generation. A running worker restarts from scratch.
    pub fn request_start(&self) {
        self.lock().flags.request_restart();
    }

    /// Ask a running worker to leave at the next check and cancel pending starts.
    pub fn request_stop(&self) {
        let mut inner = self.lock();
        inner.flags.start = false;
        if inner.flags.running {
            inner.flags.stop = true;
        }
    }

    /// Invalidate `nodes` and request a restart.
    pub(crate) fn invalidate(&self, nodes: &[NodeId]) {
        let mut inner = self.lock();
        for node in nodes {
            inner.cache.invalidate(*node);
        }
        inner.flags.request_restart();
        inner.retry_at = None;
    }

    /// Drop all cached state and request a restart.
    pub(crate) fn reset(&self) {
        let mut inner = self.lock();
        inner.cache.clear();
        inner.flags.request_restart();
        inner.flags.applying = false;
        inner.retry_at = None;
    }

    /// Move the chunk to a new coordinate, dropping everything computed for the old one.
    pub(crate) fn relocate(&self, coord: Coord) {
        let mut inner = self.lock();
        inner.coord = coord;
        inner.cache.clear();
        inner.flags.request_restart();
        inner.flags.applying = false;
        inner.retry_at = None;
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Chunk")
            .field("coord", &inner.coord)
            .field("flags", &inner.flags)
            .field("ready", &inner.cache.ready.len())
            .field("products", &inner.cache.apply.len())
            .field("vacated", &inner.cache.vacated)
            .finish()
    }
}
