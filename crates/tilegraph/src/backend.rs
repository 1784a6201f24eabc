//! The consumer of finished chunk layers.
//!
//! A [`Backend`] receives sink products one chunk at a time. Applying is cooperative:
//! [`Backend::apply`] returns an [`ApplyTask`] that the session steps a bounded number of
//! times per tick, so large layers can be handed over without stalling the driver.
//! [`MemoryBackend`] keeps everything in memory and is what the tests and demos use.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::coord::Coord;
use crate::graph::value::{ApplyData, SinkKind};
use crate::matrix::Matrix;
use crate::spatial::SpatialHash;

/// Result of one apply step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// More work remains; step again later.
    Yield,
    Done,
}

/// Resumable unit of apply work.
pub trait ApplyTask {
    fn step(&mut self) -> Step;
}

impl<F> ApplyTask for F
where
    F: FnMut() -> Step,
{
    #[inline]
    fn step(&mut self) -> Step {
        self()
    }
}

/// Receives finished layers.
pub trait Backend {
    /// Start handing `data` for `coord` over. `kind` is `data.kind()`.
    fn apply(&mut self, coord: Coord, kind: SinkKind, data: ApplyData) -> Box<dyn ApplyTask>;

    /// Remove whatever a previous apply of `kind` left at `coord`.
    fn purge(&mut self, coord: Coord, kind: SinkKind);

    /// The chunk at `coord` was retired or moved away.
    fn release(&mut self, _coord: Coord) {}
}

/// A backend that discards everything.
impl Backend for () {
    fn apply(&mut self, _coord: Coord, _kind: SinkKind, _data: ApplyData) -> Box<dyn ApplyTask> {
        Box::new(|| Step::Done)
    }

    fn purge(&mut self, _coord: Coord, _kind: SinkKind) {}
}

/// Layers applied to one coordinate.
#[derive(Clone, Debug, Default)]
pub struct AppliedLayers {
    pub height: Option<Matrix>,
    pub textures: Vec<(String, Arc<Matrix>)>,
    pub objects: Option<Arc<SpatialHash>>,
}

impl AppliedLayers {
    pub fn is_empty(&self) -> bool {
        self.height.is_none() && self.textures.is_empty() && self.objects.is_none()
    }
}

/// Call counters of a [`MemoryBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub applies: usize,
    pub steps: usize,
    pub purges: usize,
    pub releases: usize,
}

#[derive(Debug, Default)]
struct MemoryStore {
    chunks: HashMap<Coord, AppliedLayers>,
    stats: BackendStats,
}

/// In-memory backend. Clones share the same store.
///
/// Heightfields are copied a few rows per step, so a partially applied chunk is
/// observable between ticks.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    store: Arc<Mutex<MemoryStore>>,
    rows_per_step: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::default(),
            rows_per_step: 16,
        }
    }

    /// Sets how many height rows are copied per step.
    pub fn with_rows_per_step(mut self, rows: usize) -> Self {
        self.rows_per_step = rows.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        lock_store(&self.store)
    }

    pub fn layers(&self, coord: Coord) -> Option<AppliedLayers> {
        self.lock().chunks.get(&coord).cloned()
    }

    pub fn height(&self, coord: Coord) -> Option<Matrix> {
        self.lock().chunks.get(&coord).and_then(|l| l.height.clone())
    }

    /// Coordinates holding any data, sorted.
    pub fn coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self
            .lock()
            .chunks
            .iter()
            .filter(|(_, l)| !l.is_empty())
            .map(|(c, _)| *c)
            .collect();
        coords.sort_unstable();
        coords
    }

    pub fn stats(&self) -> BackendStats {
        self.lock().stats
    }
}

fn lock_store(store: &Mutex<MemoryStore>) -> MutexGuard<'_, MemoryStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

struct HeightCopy {
    store: Arc<Mutex<MemoryStore>>,
    coord: Coord,
    source: Arc<Matrix>,
    row: usize,
    rows_per_step: usize,
}

impl ApplyTask for HeightCopy {
    fn step(&mut self) -> Step {
        let mut store = lock_store(&self.store);
        store.stats.steps += 1;
        let layers = store.chunks.entry(self.coord).or_default();
        let target = layers
            .height
            .get_or_insert_with(|| Matrix::new(self.source.area));
        if target.area != self.source.area {
            *target = Matrix::new(self.source.area);
        }

        let res = self.source.resolution();
        let end = (self.row + self.rows_per_step).min(res);
        for iz in self.row..end {
            target.data[iz * res..(iz + 1) * res].copy_from_slice(self.source.row(iz));
        }
        self.row = end;
        if self.row >= res {
            Step::Done
        } else {
            Step::Yield
        }
    }
}

impl Backend for MemoryBackend {
    fn apply(&mut self, coord: Coord, _kind: SinkKind, data: ApplyData) -> Box<dyn ApplyTask> {
        self.lock().stats.applies += 1;
        let store = self.store.clone();
        match data {
            ApplyData::Height(source) => Box::new(HeightCopy {
                store,
                coord,
                source,
                row: 0,
                rows_per_step: self.rows_per_step,
            }),
            ApplyData::Textures(layers) => {
                let mut layers = Some(layers);
                Box::new(move || {
                    let mut store = lock_store(&store);
                    store.stats.steps += 1;
                    if let Some(layers) = layers.take() {
                        store.chunks.entry(coord).or_default().textures = layers;
                    }
                    Step::Done
                })
            }
            ApplyData::Objects(hash) => {
                let mut hash = Some(hash);
                Box::new(move || {
                    let mut store = lock_store(&store);
                    store.stats.steps += 1;
                    if let Some(hash) = hash.take() {
                        store.chunks.entry(coord).or_default().objects = Some(hash);
                    }
                    Step::Done
                })
            }
        }
    }

    fn purge(&mut self, coord: Coord, kind: SinkKind) {
        let mut store = self.lock();
        store.stats.purges += 1;
        if let Some(layers) = store.chunks.get_mut(&coord) {
            match kind {
                SinkKind::Height => layers.height = None,
                SinkKind::Textures => layers.textures.clear(),
                SinkKind::Objects => layers.objects = None,
            }
        }
    }

    fn release(&mut self, coord: Coord) {
        let mut store = self.lock();
        store.stats.releases += 1;
        store.chunks.remove(&coord);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::coord::ChunkArea;

    fn run(task: &mut dyn ApplyTask) -> usize {
        let mut steps = 1;
        while task.step() == Step::Yield {
            steps += 1;
        }
        steps
    }

    #[test]
    fn height_is_copied_in_row_batches() {
        let area = ChunkArea::new(Coord(1, 2), 8.0, 8);
        let source = Matrix::from_fn(area, |p| p.x);
        let mut backend = MemoryBackend::new().with_rows_per_step(3);
        let mut task = backend.apply(
            Coord(1, 2),
            SinkKind::Height,
            ApplyData::Height(Arc::new(source.clone())),
        );

        assert_eq!(task.step(), Step::Yield);
        let partial = backend.height(Coord(1, 2)).expect("height started");
        assert_eq!(partial.row(0), source.row(0));
        assert!(partial.row(5).iter().all(|v| *v == 0.0));

        assert_eq!(run(task.as_mut()), 2);
        assert_eq!(backend.height(Coord(1, 2)), Some(source));
        assert_eq!(backend.stats().steps, 3);
    }

    #[test]
    fn purge_and_release_remove_data() {
        let area = ChunkArea::new(Coord(0, 0), 4.0, 2);
        let mut backend = MemoryBackend::new();
        let mut hash = SpatialHash::new(Vec2::ZERO, 4.0, 2);
        hash.add(Vec2::ONE, 0.0, 0.0, 1.0);
        run(backend
            .apply(Coord(0, 0), SinkKind::Objects, ApplyData::Objects(Arc::new(hash)))
            .as_mut());
        run(backend
            .apply(
                Coord(0, 0),
                SinkKind::Height,
                ApplyData::Height(Arc::new(Matrix::new(area))),
            )
            .as_mut());
        assert_eq!(backend.coords(), vec![Coord(0, 0)]);

        backend.purge(Coord(0, 0), SinkKind::Objects);
        let layers = backend.layers(Coord(0, 0)).unwrap();
        assert!(layers.objects.is_none());
        assert!(layers.height.is_some());

        backend.release(Coord(0, 0));
        assert!(backend.coords().is_empty());
        let stats = backend.stats();
        assert_eq!((stats.applies, stats.purges, stats.releases), (2, 1, 1));
    }

    #[test]
    fn closures_are_tasks() {
        let mut remaining = 3;
        let mut task = move || {
            remaining -= 1;
            if remaining == 0 {
                Step::Done
            } else {
                Step::Yield
            }
        };
        assert_eq!(run(&mut task), 3);
        let mut null = ();
        assert_eq!(
            run(null
                .apply(Coord(0, 0), SinkKind::Textures, ApplyData::Textures(Vec::new()))
                .as_mut()),
            1
        );
    }
}
