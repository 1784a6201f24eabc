//! Chunk coordinates and world-space helpers.
//!
//! Convert between world positions and integer chunk coordinates, describe rectangular
//! coordinate ranges ([`CoordRect`]) and the world area a chunk covers ([`ChunkArea`]).
use std::fmt;

use glam::{IVec2, Vec2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer coordinate of a chunk in the tiled world.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord(
    /// Chunk index along the X axis.
    pub i32,
    /// Chunk index along the Z axis.
    pub i32,
);

impl Coord {
    /// Chunk containing the given world position.
    pub fn from_world(position: Vec2, chunk_size: f32) -> Self {
        debug_assert!(chunk_size > 0.0, "chunk_size must be > 0");
        Coord(
            (position.x / chunk_size).floor() as i32,
            (position.y / chunk_size).floor() as i32,
        )
    }

    /// World position of the chunk's lower corner.
    pub fn origin(self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.0 as f32, self.1 as f32) * chunk_size
    }

    /// World position of the chunk's center.
    pub fn center(self, chunk_size: f32) -> Vec2 {
        self.origin(chunk_size) + Vec2::splat(chunk_size * 0.5)
    }

    /// Squared distance in chunk units.
    pub fn distance_squared(self, other: Coord) -> i64 {
        let dx = (self.0 - other.0) as i64;
        let dz = (self.1 - other.1) as i64;
        dx * dx + dz * dz
    }
}

impl From<IVec2> for Coord {
    fn from(value: IVec2) -> Self {
        Coord(value.x, value.y)
    }
}

impl From<Coord> for IVec2 {
    fn from(value: Coord) -> Self {
        IVec2::new(value.0, value.1)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Inclusive rectangle of chunk coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoordRect {
    pub min: Coord,
    pub max: Coord,
}

impl CoordRect {
    /// Rectangle spanning `radius` chunks on every side of `center`.
    pub fn around(center: Coord, radius: i32) -> Self {
        Self {
            min: Coord(center.0 - radius, center.1 - radius),
            max: Coord(center.0 + radius, center.1 + radius),
        }
    }

    /// Same rectangle grown by `margin` chunks on every side.
    pub fn expanded(self, margin: i32) -> Self {
        Self {
            min: Coord(self.min.0 - margin, self.min.1 - margin),
            max: Coord(self.max.0 + margin, self.max.1 + margin),
        }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.0 >= self.min.0 && coord.0 <= self.max.0 && coord.1 >= self.min.1 && coord.1 <= self.max.1
    }

    /// Number of coordinates inside the rectangle.
    pub fn area(&self) -> usize {
        let w = (self.max.0 - self.min.0 + 1).max(0) as usize;
        let h = (self.max.1 - self.min.1 + 1).max(0) as usize;
        w * h
    }

    /// Iterates coordinates row by row.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (self.min.1..=self.max.1).flat_map(move |z| (self.min.0..=self.max.0).map(move |x| Coord(x, z)))
    }
}

/// World-space area covered by one chunk, with its raster resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkArea {
    /// Coordinate of the chunk.
    pub coord: Coord,
    /// World-space lower corner.
    pub origin: Vec2,
    /// Edge length in world units.
    pub size: f32,
    /// Raster cells per edge.
    pub resolution: usize,
}

impl ChunkArea {
    pub fn new(coord: Coord, chunk_size: f32, resolution: usize) -> Self {
        debug_assert!(resolution > 0, "resolution must be > 0");
        Self {
            coord,
            origin: coord.origin(chunk_size),
            size: chunk_size,
            resolution,
        }
    }

    /// Size of one raster cell in world units.
    pub fn cell_size(&self) -> f32 {
        self.size / self.resolution as f32
    }

    /// World position of the center of raster cell `(ix, iz)`.
    pub fn cell_center(&self, ix: usize, iz: usize) -> Vec2 {
        let cell = self.cell_size();
        self.origin + Vec2::new((ix as f32 + 0.5) * cell, (iz as f32 + 0.5) * cell)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.origin.x
            && p.y >= self.origin.y
            && p.x < self.origin.x + self.size
            && p.y < self.origin.y + self.size
    }
}

/// Creates a deterministic seed for a chunk from a base seed.
pub fn seed_for_chunk(base_seed: u64, coord: Coord) -> u64 {
    let cx = coord.0 as i64 as u64;
    let cz = coord.1 as i64 as u64;
    let mixed =
        base_seed ^ cx.wrapping_mul(0x9E3779B97F4A7C15) ^ cz.wrapping_mul(0xBF58476D1CE4E5B9);
    mix_u64(mixed)
}

#[inline]
pub(crate) fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_world_floors_negative_positions() {
        assert_eq!(Coord::from_world(Vec2::new(-0.5, 10.0), 10.0), Coord(-1, 1));
        assert_eq!(Coord::from_world(Vec2::new(19.99, -20.0), 10.0), Coord(1, -2));
    }

    #[test]
    fn origin_and_center_match_chunk_size() {
        let c = Coord(2, -1);
        assert_eq!(c.origin(4.0), Vec2::new(8.0, -4.0));
        assert_eq!(c.center(4.0), Vec2::new(10.0, -2.0));
    }

    #[test]
    fn rect_area_and_iteration_agree() {
        let rect = CoordRect::around(Coord(0, 0), 1).expanded(1);
        assert_eq!(rect.area(), 25);
        assert_eq!(rect.iter().count(), 25);
        assert!(rect.contains(Coord(-2, 2)));
        assert!(!rect.contains(Coord(3, 0)));
    }

    #[test]
    fn area_cell_centers_lie_inside() {
        let area = ChunkArea::new(Coord(1, 1), 8.0, 4);
        assert_eq!(area.cell_size(), 2.0);
        assert_eq!(area.cell_center(0, 0), Vec2::new(9.0, 9.0));
        assert!(area.contains(area.cell_center(3, 3)));
        assert!(!area.contains(Vec2::new(16.0, 9.0)));
    }

    #[test]
    fn seed_differs_between_neighbours() {
        let a = seed_for_chunk(7, Coord(0, 0));
        let b = seed_for_chunk(7, Coord(1, 0));
        let c = seed_for_chunk(7, Coord(0, 1));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, seed_for_chunk(7, Coord(0, 0)));
    }
}
