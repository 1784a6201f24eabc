//! Viewpoint-driven chunk placement.
//!
//! [`ChunkGrid`] keeps a coordinate-indexed set of chunk objects around one or more
//! viewpoints. Each [`ChunkGrid::deploy`] fills the coordinates in range nearest-first,
//! reusing chunks that fell out of range (relocating them) before constructing new ones,
//! and retires whatever is left. Construction, relocation and retirement go through a
//! [`GridLifecycle`], so the grid itself never knows what a chunk holds.
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::coord::{Coord, CoordRect};

/// Hooks invoked as the grid creates, moves and drops its items.
pub trait GridLifecycle<T> {
    fn create(&mut self, coord: Coord) -> T;

    fn relocate(&mut self, item: &mut T, from: Coord, to: Coord);

    fn retire(&mut self, coord: Coord, item: T);
}

/// What a deploy call changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// The covered rectangles were unchanged, so nothing was done.
    pub skipped: bool,
    /// Chunks kept at their coordinate.
    pub retained: usize,
    pub created: Vec<Coord>,
    /// `(from, to)` pairs of relocated chunks.
    pub relocated: Vec<(Coord, Coord)>,
    pub retired: Vec<Coord>,
}

impl DeployReport {
    /// Whether the deploy changed nothing.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.relocated.is_empty() && self.retired.is_empty()
    }
}

/// Coordinate-indexed set of chunks that follows viewpoints.
#[derive(Debug)]
pub struct ChunkGrid<T> {
    chunks: HashMap<Coord, T>,
    nailed: BTreeSet<Coord>,
    last_rects: Vec<CoordRect>,
    dirty: bool,
    margin: i32,
}

impl<T> ChunkGrid<T> {
    /// Create an empty grid that keeps `margin` extra chunks beyond the covered range.
    pub fn new(margin: i32) -> Self {
        Self {
            chunks: HashMap::new(),
            nailed: BTreeSet::new(),
            last_rects: Vec::new(),
            dirty: true,
            margin: margin.max(0),
        }
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, coord: Coord) -> Option<&T> {
        self.chunks.get(&coord)
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, &T)> {
        self.chunks.iter().map(|(c, t)| (*c, t))
    }

    /// Deployed coordinates, sorted.
    pub fn coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self.chunks.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    pub fn is_nailed(&self, coord: Coord) -> bool {
        self.nailed.contains(&coord)
    }

    /// Force the next deploy to run even if the viewpoints did not move.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rectangles covered by the last deploy.
    pub fn covered(&self) -> &[CoordRect] {
        &self.last_rects
    }

    /// Bring the grid in line with `centers`, each covering `radius` chunks on every side.
    pub fn deploy(
        &mut self,
        centers: &[Coord],
        radius: i32,
        allow_move: bool,
        lifecycle: &mut impl GridLifecycle<T>,
    ) -> DeployReport {
        let rects: Vec<CoordRect> = centers
            .iter()
            .map(|c| CoordRect::around(*c, radius.max(0)))
            .collect();
        if !self.dirty && rects == self.last_rects {
            return DeployReport {
                skipped: true,
                retained: self.chunks.len(),
                ..Default::default()
            };
        }
        self.dirty = false;

        let keep: Vec<CoordRect> = rects.iter().map(|r| r.expanded(self.margin)).collect();
        let distance = |coord: Coord| {
            centers
                .iter()
                .map(|c| c.distance_squared(coord))
                .min()
                .unwrap_or(i64::MAX)
        };

        let mut report = DeployReport::default();
        let mut unused: Vec<Coord> = self
            .chunks
            .keys()
            .copied()
            .filter(|c| !self.nailed.contains(c) && !keep.iter().any(|r| r.contains(*c)))
            .collect();
        report.retained = self.chunks.len() - unused.len();
        // Nearest first; relocation pops the furthest from the back.
        unused.sort_unstable_by_key(|c| (distance(*c), *c));

        let mut seen = HashSet::new();
        let mut empty: Vec<Coord> = rects
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| !self.chunks.contains_key(c) && seen.insert(*c))
            .collect();
        empty.sort_unstable_by_key(|c| (distance(*c), *c));

        for coord in empty {
            let reused = if allow_move { unused.pop() } else { None };
            match reused.and_then(|from| self.chunks.remove(&from).map(|item| (from, item))) {
                Some((from, mut item)) => {
                    lifecycle.relocate(&mut item, from, coord);
                    self.chunks.insert(coord, item);
                    report.relocated.push((from, coord));
                }
                None => {
                    self.chunks.insert(coord, lifecycle.create(coord));
                    report.created.push(coord);
                }
            }
        }

        for coord in unused {
            if let Some(item) = self.chunks.remove(&coord) {
                lifecycle.retire(coord, item);
                report.retired.push(coord);
            }
        }

        self.last_rects = rects;
        report
    }

    /// Pin `coord`, creating its chunk if needed. Returns whether a chunk was created.
    pub fn nail(&mut self, coord: Coord, lifecycle: &mut impl GridLifecycle<T>) -> bool {
        self.nailed.insert(coord);
        if self.chunks.contains_key(&coord) {
            return false;
        }
        self.chunks.insert(coord, lifecycle.create(coord));
        true
    }

    /// Release a pin. With `destroy` the chunk is retired right away; otherwise the next
    /// deploy decides whether it stays.
    pub fn unnail(
        &mut self,
        coord: Coord,
        destroy: bool,
        lifecycle: &mut impl GridLifecycle<T>,
    ) -> bool {
        let was_nailed = self.nailed.remove(&coord);
        if destroy {
            if let Some(item) = self.chunks.remove(&coord) {
                lifecycle.retire(coord, item);
            }
        }
        self.dirty = true;
        was_nailed
    }

    /// Retire every chunk and forget all pins.
    pub fn clear(&mut self, lifecycle: &mut impl GridLifecycle<T>) {
        for (coord, item) in self.chunks.drain() {
            lifecycle.retire(coord, item);
        }
        self.nailed.clear();
        self.last_rects.clear();
        self.dirty = true;
    }
}
