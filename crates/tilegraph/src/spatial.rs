//! Bucketed point index for scatter and object generators.
//!
//! [`SpatialHash`] splits a square region into `resolution × resolution` cells and stores
//! [`SpatialObject`]s in the cell that owns their position. Radius and nearest queries only
//! visit the rings of cells that can contain a hit, so the cost of a query does not grow
//! with the number of stored points.
use glam::Vec2;

/// A point object stored in a [`SpatialHash`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialObject {
    pub pos: Vec2,
    pub height: f32,
    pub rotation: f32,
    pub size: f32,
    pub id: u32,
}

impl SpatialObject {
    pub fn at(pos: Vec2) -> Self {
        Self {
            pos,
            height: 0.0,
            rotation: 0.0,
            size: 1.0,
            id: 0,
        }
    }
}

/// Square region `[offset, offset + size)` bucketed into cells.
///
/// Callers keep positions inside the region; out-of-region objects are debug-asserted and
/// filed into the nearest border cell. `Clone` copies every cell list.
#[derive(Clone, Debug)]
pub struct SpatialHash {
    offset: Vec2,
    size: f32,
    resolution: usize,
    cell_size: f32,
    cells: Vec<Vec<SpatialObject>>,
    count: usize,
    next_id: u32,
}

impl SpatialHash {
    /// Create an empty index over the given region.
    pub fn new(offset: Vec2, size: f32, resolution: usize) -> Self {
        debug_assert!(size > 0.0, "size must be > 0");
        let resolution = resolution.max(1);
        Self {
            offset,
            size,
            resolution,
            cell_size: size / resolution as f32,
            cells: vec![Vec::new(); resolution * resolution],
            count: 0,
            next_id: 0,
        }
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `pos` lies inside the indexed region.
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.offset.x
            && pos.y >= self.offset.y
            && pos.x < self.offset.x + self.size
            && pos.y < self.offset.y + self.size
    }

    /// Clamp a position into the region.
    pub fn clamp(&self, pos: Vec2) -> Vec2 {
        let max = self.offset + Vec2::splat(self.size - self.size * f32::EPSILON);
        pos.clamp(self.offset, max)
    }

    #[inline]
    fn cell_coords(&self, pos: Vec2) -> (usize, usize) {
        let local = (pos - self.offset) / self.cell_size;
        let last = self.resolution as isize - 1;
        let x = (local.x.floor() as isize).clamp(0, last) as usize;
        let z = (local.y.floor() as isize).clamp(0, last) as usize;
        (x, z)
    }

    #[inline]
    fn cell_index(&self, x: usize, z: usize) -> usize {
        z * self.resolution + x
    }

    /// Add an object at `pos` and return its identity.
    pub fn add(&mut self, pos: Vec2, height: f32, rotation: f32, size: f32) -> u32 {
        let id = self.next_id;
        self.add_object(SpatialObject {
            pos,
            height,
            rotation,
            size,
            id,
        });
        id
    }

    /// Add a prepared object. Its `id` is kept as is.
    pub fn add_object(&mut self, obj: SpatialObject) {
        debug_assert!(
            self.contains(obj.pos),
            "object position {:?} outside spatial hash region",
            obj.pos
        );
        let (x, z) = self.cell_coords(obj.pos);
        let idx = self.cell_index(x, z);
        self.cells[idx].push(obj);
        self.count += 1;
        self.next_id = self.next_id.max(obj.id.wrapping_add(1));
    }

    /// Iterate every stored object, cell by cell.
    pub fn iter(&self) -> impl Iterator<Item = &SpatialObject> {
        self.cells.iter().flatten()
    }

    /// Keep only objects for which `f` returns true.
    pub fn retain(&mut self, mut f: impl FnMut(&SpatialObject) -> bool) {
        let mut count = 0;
        for cell in &mut self.cells {
            cell.retain(|o| f(o));
            count += cell.len();
        }
        self.count = count;
    }

    /// Remove every object.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.count = 0;
    }

    /// Inclusive range of cells that can hold a point within `radius` of `pos`.
    fn cell_span(&self, pos: Vec2, radius: f32) -> (usize, usize, usize, usize) {
        let (min_x, min_z) = self.cell_coords(pos - Vec2::splat(radius));
        let (max_x, max_z) = self.cell_coords(pos + Vec2::splat(radius));
        (min_x, min_z, max_x, max_z)
    }

    fn for_each_in_range(&self, pos: Vec2, radius: f32, mut f: impl FnMut(&SpatialObject) -> bool) {
        if radius < 0.0 || self.count == 0 {
            return;
        }
        let radius_sq = radius * radius;
        let (min_x, min_z, max_x, max_z) = self.cell_span(pos, radius);
        for z in min_z..=max_z {
            for x in min_x..=max_x {
                for obj in &self.cells[self.cell_index(x, z)] {
                    if obj.pos.distance_squared(pos) <= radius_sq && !f(obj) {
                        return;
                    }
                }
            }
        }
    }

    /// All objects whose distance to `pos` is at most `radius`.
    pub fn objs_in_range(&self, pos: Vec2, radius: f32) -> Vec<SpatialObject> {
        let mut found = Vec::new();
        self.for_each_in_range(pos, radius, |obj| {
            found.push(*obj);
            true
        });
        found
    }

    /// Whether any object lies within `radius` of `pos`. Stops at the first hit.
    pub fn is_any_obj_in_range(&self, pos: Vec2, radius: f32) -> bool {
        let mut hit = false;
        self.for_each_in_range(pos, radius, |_| {
            hit = true;
            false
        });
        hit
    }

    /// Nearest object to `pos`, searching rings of cells outward.
    pub fn closest(&self, pos: Vec2) -> Option<SpatialObject> {
        if self.count == 0 {
            return None;
        }
        let (cx, cz) = self.cell_coords(pos);
        let mut best: Option<(f32, SpatialObject)> = None;

        for ring in 0..self.resolution {
            // Anything in ring `r` is at least (r - 1) cells away from `pos`.
            if let Some((best_sq, _)) = best {
                let reach = (ring as f32 - 1.0).max(0.0) * self.cell_size;
                if reach * reach > best_sq {
                    break;
                }
            }
            self.visit_ring(cx, cz, ring, |obj| {
                let d = obj.pos.distance_squared(pos);
                if best.is_none_or(|(b, _)| d < b) {
                    best = Some((d, *obj));
                }
            });
        }

        best.map(|(_, obj)| obj)
    }

    /// Distance from `pos` to the nearest object.
    pub fn min_distance(&self, pos: Vec2) -> Option<f32> {
        self.closest(pos).map(|obj| obj.pos.distance(pos))
    }

    fn visit_ring(&self, cx: usize, cz: usize, ring: usize, mut f: impl FnMut(&SpatialObject)) {
        let r = ring as isize;
        let res = self.resolution as isize;
        let (cx, cz) = (cx as isize, cz as isize);
        for z in (cz - r)..=(cz + r) {
            if z < 0 || z >= res {
                continue;
            }
            let on_edge_row = z == cz - r || z == cz + r;
            let step = if on_edge_row || r == 0 { 1 } else { (2 * r) as usize };
            let mut x = cx - r;
            while x <= cx + r {
                if x >= 0 && x < res {
                    for obj in &self.cells[self.cell_index(x as usize, z as usize)] {
                        f(obj);
                    }
                }
                x += step as isize;
            }
        }
    }
}
