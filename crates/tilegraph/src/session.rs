//! The per-tick driver.
//!
//! A [`Session`] bundles the graph, the chunk grid, the backend and the scheduler state.
//! The host calls [`Session::tick`] once per frame with the current viewpoints; each tick
//! collects finished workers, redeploys the grid, starts generation for waiting chunks
//! within the thread budget, and steps the single in-flight apply job.
//!
//! Graph edits go through the session so that every deployed chunk sees the change: the
//! affected nodes are invalidated and the chunks are asked to regenerate.
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec2;
use tracing::{debug, info, warn};

use crate::backend::{ApplyTask, Backend, Step};
use crate::chunk::worker::{self, WorkerExit, WorkerOutcome};
use crate::chunk::{Chunk, ChunkState};
use crate::config::SessionConfig;
use crate::coord::Coord;
use crate::error::Result;
use crate::events::{emit, EventSink, SessionEvent, SessionEventKind};
use crate::graph::generator::Generator;
use crate::graph::port::{InputRef, OutputRef};
use crate::graph::value::{ApplyData, SinkKind};
use crate::graph::{Graph, NodeId, SharedGraph};
use crate::grid::{ChunkGrid, DeployReport, GridLifecycle};

/// Share of deployed chunks whose generation is fully applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub complete: usize,
    pub total: usize,
}

impl Progress {
    /// Completed share in [0, 1]. An empty grid counts as done.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.complete as f32 / self.total as f32
        }
    }
}

/// Products of one chunk being handed to the backend.
struct ApplyJob {
    chunk: Chunk,
    coord: Coord,
    kinds: Vec<SinkKind>,
    /// Kinds rolled back before the queue is applied.
    purges: Vec<SinkKind>,
    queue: VecDeque<ApplyData>,
    current: Option<Box<dyn ApplyTask>>,
}

/// Grid hooks that keep chunks, backend and apply job consistent.
struct Lifecycle<'a, B: Backend> {
    backend: &'a mut B,
    apply: &'a mut Option<ApplyJob>,
    sink: &'a mut dyn EventSink,
}

impl<B: Backend> Lifecycle<'_, B> {
    fn abort_apply(&mut self, chunk: &Chunk) {
        if self.apply.as_ref().is_some_and(|job| job.chunk.same(chunk)) {
            debug!("Aborting apply for chunk {}.", chunk.coord());
            *self.apply = None;
        }
    }
}

impl<B: Backend> GridLifecycle<Chunk> for Lifecycle<'_, B> {
    fn create(&mut self, coord: Coord) -> Chunk {
        let chunk = Chunk::new(coord);
        chunk.request_start();
        emit(self.sink, SessionEventKind::ChunkCreated, || {
            SessionEvent::ChunkCreated { coord }
        });
        chunk
    }

    fn relocate(&mut self, chunk: &mut Chunk, from: Coord, to: Coord) {
        self.abort_apply(chunk);
        chunk.relocate(to);
        self.backend.release(from);
        emit(self.sink, SessionEventKind::ChunkRelocated, || {
            SessionEvent::ChunkRelocated { from, to }
        });
    }

    fn retire(&mut self, coord: Coord, chunk: Chunk) {
        self.abort_apply(&chunk);
        chunk.request_stop();
        self.backend.release(coord);
        emit(self.sink, SessionEventKind::ChunkRetired, || {
            SessionEvent::ChunkRetired { coord }
        });
    }
}

/// A generation session over one graph and one backend.
pub struct Session<B: Backend> {
    config: Arc<SessionConfig>,
    graph: SharedGraph,
    grid: ChunkGrid<Chunk>,
    backend: B,
    exits_tx: Sender<WorkerExit>,
    exits_rx: Receiver<WorkerExit>,
    running: usize,
    apply: Option<ApplyJob>,
    centers: Vec<Coord>,
    tick: u64,
    sink_kinds: BTreeSet<SinkKind>,
    pending_purge: BTreeSet<SinkKind>,
}

impl<B: Backend> Session<B> {
    /// Create a session. Fails if the configuration or the graph is invalid.
    pub fn new(config: SessionConfig, graph: Graph, backend: B) -> Result<Self> {
        config.validate()?;
        graph.validate()?;
        let (exits_tx, exits_rx) = unbounded();
        Ok(Self {
            grid: ChunkGrid::new(config.stock_margin),
            config: Arc::new(config),
            sink_kinds: graph.enabled_sink_kinds(),
            graph: SharedGraph::new(graph),
            backend,
            exits_tx,
            exits_rx,
            running: 0,
            apply: None,
            centers: Vec::new(),
            tick: 0,
            pending_purge: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current version of the graph.
    pub fn graph(&self) -> Arc<Graph> {
        self.graph.snapshot()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn chunk(&self, coord: Coord) -> Option<&Chunk> {
        self.grid.get(coord)
    }

    /// Deployed coordinates, sorted.
    pub fn coords(&self) -> Vec<Coord> {
        self.grid.coords()
    }

    pub fn chunk_state(&self, coord: Coord) -> Option<ChunkState> {
        self.grid.get(coord).map(Chunk::state)
    }

    pub fn running_workers(&self) -> usize {
        self.running
    }

    pub fn progress(&self) -> Progress {
        Progress {
            complete: self.grid.iter().filter(|(_, c)| c.is_complete()).count(),
            total: self.grid.len(),
        }
    }

    /// Nothing is running, waiting or queued, and every deployed chunk is complete.
    pub fn is_idle(&self) -> bool {
        self.running == 0
            && self.apply.is_none()
            && self.pending_purge.is_empty()
            && self.grid.iter().all(|(_, c)| c.is_complete())
    }

    /// Run one driver step without observing events.
    pub fn tick(&mut self, viewpoints: &[Vec2]) {
        self.tick_with_events(viewpoints, &mut ());
    }

    /// Run one driver step, reporting what happened to `sink`.
    pub fn tick_with_events(&mut self, viewpoints: &[Vec2], sink: &mut dyn EventSink) {
        self.tick += 1;
        self.collect_exits(sink);

        let centers: Vec<Coord> = viewpoints
            .iter()
            .map(|p| Coord::from_world(*p, self.config.chunk_size))
            .collect();
        self.deploy(centers, sink);

        self.schedule_retries();
        self.start_waiting(sink);
        self.step_apply(sink);

        if self.apply.is_none() && !self.pending_purge.is_empty() && !self.has_products() {
            self.run_purges(sink);
        }
    }

    fn deploy(&mut self, centers: Vec<Coord>, sink: &mut dyn EventSink) -> DeployReport {
        let mut lifecycle = Lifecycle {
            backend: &mut self.backend,
            apply: &mut self.apply,
            sink,
        };
        let report = self.grid.deploy(
            &centers,
            self.config.range_in_chunks(),
            self.config.allow_move,
            &mut lifecycle,
        );
        if !report.skipped && !report.is_noop() {
            debug!(
                "Deployed grid: {} retained, {} created, {} relocated, {} retired.",
                report.retained,
                report.created.len(),
                report.relocated.len(),
                report.retired.len()
            );
        }
        self.centers = centers;
        report
    }

    fn distance_to_viewpoints(&self, coord: Coord) -> i64 {
        self.centers
            .iter()
            .map(|c| c.distance_squared(coord))
            .min()
            .unwrap_or(0)
    }

    /// Deployed chunks sorted nearest-first, filtered by `f`.
    fn nearest_chunks(&self, f: impl Fn(&Chunk) -> bool) -> Vec<Chunk> {
        let mut chunks: Vec<(i64, Coord, Chunk)> = self
            .grid
            .iter()
            .filter(|&(_, c)| f(c))
            .map(|(coord, c)| (self.distance_to_viewpoints(coord), coord, c.clone()))
            .collect();
        chunks.sort_unstable_by_key(|(d, coord, _)| (*d, *coord));
        chunks.into_iter().map(|(_, _, c)| c).collect()
    }

    fn has_products(&self) -> bool {
        self.grid
            .iter()
            .any(|(_, c)| c.with_cache(|cache| cache.has_products()))
    }

    fn collect_exits(&mut self, sink: &mut dyn EventSink) {
        while let Ok(exit) = self.exits_rx.try_recv() {
            self.running = self.running.saturating_sub(1);
            self.handle_exit(exit, sink);
        }
    }

    fn handle_exit(&mut self, exit: WorkerExit, sink: &mut dyn EventSink) {
        let WorkerExit {
            chunk,
            coord,
            outcome,
        } = exit;
        let deployed = self.grid.get(coord).is_some_and(|c| c.same(&chunk));
        if !deployed {
            debug!("Worker for retired chunk {} exited.", coord);
            return;
        }
        match outcome {
            WorkerOutcome::Completed => {
                {
                    let mut inner = chunk.lock();
                    if !inner.flags.start && !inner.cache.has_products() {
                        inner.flags.complete = true;
                    }
                }
                emit(sink, SessionEventKind::GenerationCompleted, || {
                    SessionEvent::GenerationCompleted { coord }
                });
            }
            WorkerOutcome::Stopped => {
                debug!("Generation for chunk {} stopped.", coord);
            }
            WorkerOutcome::Failed(message) => {
                warn!(
                    "Generation for chunk {} failed: {}. Retrying in {} ticks.",
                    coord, message, self.config.retry_delay_ticks
                );
                {
                    let mut inner = chunk.lock();
                    if !inner.flags.start {
                        inner.retry_at = Some(self.tick + self.config.retry_delay_ticks);
                    }
                }
                emit(sink, SessionEventKind::GenerationFailed, || {
                    SessionEvent::GenerationFailed { coord, message }
                });
            }
        }
    }

    fn schedule_retries(&mut self) {
        let tick = self.tick;
        for (_, chunk) in self.grid.iter() {
            let mut inner = chunk.lock();
            if inner.retry_at.is_some_and(|at| at <= tick) {
                inner.retry_at = None;
                inner.flags.request_restart();
            }
        }
    }

    fn start_waiting(&mut self, sink: &mut dyn EventSink) {
        let waiting = self.nearest_chunks(|c| {
            let flags = c.flags();
            flags.start && !flags.running && !flags.applying
        });

        for chunk in waiting {
            if self.config.multithreading && self.running >= self.config.max_threads {
                break;
            }
            if !worker::claim(&chunk) {
                continue;
            }
            let coord = chunk.coord();
            emit(sink, SessionEventKind::GenerationStarted, || {
                SessionEvent::GenerationStarted { coord }
            });

            if !self.config.multithreading {
                let exit = worker::run_claimed(&chunk, &self.graph, &self.config);
                self.handle_exit(exit, sink);
                continue;
            }

            match worker::spawn(
                chunk.clone(),
                self.graph.clone(),
                self.config.clone(),
                self.exits_tx.clone(),
            ) {
                Ok(_handle) => self.running += 1,
                Err(err) => {
                    warn!("{}. Retrying next tick.", err);
                    let mut inner = chunk.lock();
                    inner.flags.running = false;
                    inner.flags.start = true;
                    break;
                }
            }
        }
    }

    fn begin_apply(&mut self) -> Option<ApplyJob> {
        let candidates = self.nearest_chunks(|c| {
            c.with_cache(|cache| cache.has_products()) && c.flags().can_apply()
        });
        for chunk in candidates {
            let mut inner = chunk.lock();
            if !inner.flags.can_apply() || !inner.cache.has_products() {
                continue;
            }
            inner.flags.applying = true;
            let products = std::mem::take(&mut inner.cache.apply);
            let purges = std::mem::take(&mut inner.cache.vacated);
            let coord = inner.coord;
            drop(inner);

            let queue: VecDeque<ApplyData> = products.into_values().collect();
            return Some(ApplyJob {
                kinds: queue.iter().map(ApplyData::kind).collect(),
                purges: purges.into_iter().collect(),
                chunk,
                coord,
                queue,
                current: None,
            });
        }
        None
    }

    fn step_apply(&mut self, sink: &mut dyn EventSink) {
        if self.apply.is_none() {
            self.apply = self.begin_apply();
        }
        let Some(job) = self.apply.as_mut() else {
            return;
        };
        for kind in std::mem::take(&mut job.purges) {
            debug!("Rolling back '{}' output of chunk {}.", kind, job.coord);
            self.backend.purge(job.coord, kind);
        }

        let mut finished = false;
        for _ in 0..self.config.apply_steps_per_tick {
            if job.current.is_none() {
                match job.queue.pop_front() {
                    Some(data) => {
                        let kind = data.kind();
                        job.current = Some(self.backend.apply(job.coord, kind, data));
                    }
                    None => {
                        finished = true;
                        break;
                    }
                }
            }
            if let Some(task) = job.current.as_mut() {
                if task.step() == Step::Done {
                    job.current = None;
                }
            }
        }
        if job.current.is_none() && job.queue.is_empty() {
            finished = true;
        }

        if finished {
            if let Some(job) = self.apply.take() {
                self.finish_apply(job, sink);
            }
        }
    }

    fn finish_apply(&mut self, job: ApplyJob, sink: &mut dyn EventSink) {
        {
            let mut inner = job.chunk.lock();
            inner.flags.applying = false;
            if !inner.flags.start {
                inner.flags.complete = true;
            }
            if !self.config.save_intermediate {
                inner.cache.clear_results();
            }
        }
        debug!("Applied {} products to chunk {}.", job.kinds.len(), job.coord);
        emit(sink, SessionEventKind::ApplyCompleted, || {
            SessionEvent::ApplyCompleted {
                coord: job.coord,
                kinds: job.kinds,
            }
        });
        if !self.pending_purge.is_empty() {
            self.run_purges(sink);
        }
    }

    fn run_purges(&mut self, sink: &mut dyn EventSink) {
        let coords = self.grid.coords();
        for kind in std::mem::take(&mut self.pending_purge) {
            for coord in &coords {
                self.backend.purge(*coord, kind);
            }
            info!("Purged '{}' output from {} chunks.", kind, coords.len());
            emit(sink, SessionEventKind::Purged, || SessionEvent::Purged {
                kind,
                chunks: coords.len(),
            });
        }
    }

    /// Record sink kinds that disappeared, then invalidate `nodes` in every deployed chunk.
    fn after_edit(&mut self, nodes: &[NodeId]) {
        let kinds = self.graph.snapshot().enabled_sink_kinds();
        for gone in self.sink_kinds.difference(&kinds) {
            debug!("Output '{}' is gone; scheduling purge.", gone);
            self.pending_purge.insert(*gone);
        }
        self.pending_purge.retain(|k| !kinds.contains(k));
        self.sink_kinds = kinds;

        for (_, chunk) in self.grid.iter() {
            chunk.invalidate(nodes);
        }
    }

    /// Add a node. A new sink makes every deployed chunk regenerate.
    pub fn add_node<G: Generator>(&mut self, generator: G) -> Result<NodeId> {
        let id = self.graph.update(|g| g.add(generator))?;
        self.after_edit(&[id]);
        Ok(id)
    }

    /// Add a node created through a registry.
    pub fn add_boxed(&mut self, generator: Box<dyn Generator>) -> Result<NodeId> {
        let id = self.graph.update(|g| g.add_boxed(generator))?;
        self.after_edit(&[id]);
        Ok(id)
    }

    /// Remove a node and its links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let mut affected = self.graph.update(|g| {
            let dependents = g.dependents(id);
            g.remove(id)?;
            Ok(dependents)
        })?;
        affected.push(id);
        self.after_edit(&affected);
        Ok(())
    }

    /// Connect `from` to `to`. Rejected links leave graph and chunks untouched.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<()> {
        self.graph.update(|g| g.link(from, to))?;
        self.after_edit(&[to.node]);
        Ok(())
    }

    /// Disconnect an input. Returns the output it was linked to.
    pub fn unlink(&mut self, to: InputRef) -> Option<OutputRef> {
        let removed = self.graph.update(|g| Ok(g.unlink(to))).ok().flatten();
        if removed.is_some() {
            self.after_edit(&[to.node]);
        }
        removed
    }

    /// Enable or disable a node.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<()> {
        let affected = self.graph.update(|g| {
            let changed = g.set_enabled(id, enabled)?;
            let mut affected = if changed { g.dependents(id) } else { Vec::new() };
            if changed {
                affected.push(id);
            }
            Ok(affected)
        })?;
        if !affected.is_empty() {
            self.after_edit(&affected);
        }
        Ok(())
    }

    /// Change a node's parameters.
    pub fn edit_node<G, F>(&mut self, id: NodeId, f: F) -> Result<()>
    where
        G: Generator + Clone,
        F: FnOnce(&mut G),
    {
        let dropped = self.graph.update(|g| g.edit_node::<G, F>(id, f))?;
        let mut affected: Vec<NodeId> = dropped.iter().map(|input| input.node).collect();
        affected.push(id);
        affected.sort_unstable();
        affected.dedup();
        self.after_edit(&affected);
        Ok(())
    }

    /// Drop every cache and regenerate all deployed chunks.
    pub fn force_generate(&mut self) {
        info!("Regenerating all {} chunks.", self.grid.len());
        self.apply = None;
        for (_, chunk) in self.grid.iter() {
            chunk.reset();
        }
        self.grid.mark_dirty();
    }

    /// Pin a chunk coordinate regardless of viewpoint distance.
    pub fn nail(&mut self, coord: Coord) -> bool {
        let mut lifecycle = Lifecycle {
            backend: &mut self.backend,
            apply: &mut self.apply,
            sink: &mut (),
        };
        self.grid.nail(coord, &mut lifecycle)
    }

    /// Release a pinned coordinate, optionally retiring its chunk right away.
    pub fn unnail(&mut self, coord: Coord, destroy: bool) -> bool {
        let mut lifecycle = Lifecycle {
            backend: &mut self.backend,
            apply: &mut self.apply,
            sink: &mut (),
        };
        self.grid.unnail(coord, destroy, &mut lifecycle)
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        for (_, chunk) in self.grid.iter() {
            chunk.request_stop();
        }
    }
}
