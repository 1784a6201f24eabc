//! Raster storage for per-chunk scalar layers.
//!
//! A [`Matrix`] holds one value per raster cell of a [`ChunkArea`]. Heightfields and
//! texture weights both travel through the graph as matrices.
use glam::Vec2;

use crate::coord::ChunkArea;

/// A square grid of floating point values laid over a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub area: ChunkArea,
    pub data: Vec<f32>,
}

impl Matrix {
    /// Create a new matrix over the given area, initializing all values to zero.
    pub fn new(area: ChunkArea) -> Self {
        Self::filled(area, 0.0)
    }

    /// Create a new matrix with every cell set to `value`.
    pub fn filled(area: ChunkArea, value: f32) -> Self {
        let len = area.resolution * area.resolution;
        Self {
            area,
            data: vec![value; len],
        }
    }

    /// Create a matrix by evaluating `f` at every cell center.
    pub fn from_fn(area: ChunkArea, mut f: impl FnMut(Vec2) -> f32) -> Self {
        let res = area.resolution;
        let mut data = Vec::with_capacity(res * res);
        for iz in 0..res {
            for ix in 0..res {
                data.push(f(area.cell_center(ix, iz)));
            }
        }
        Self { area, data }
    }

    /// Cells per edge.
    pub fn resolution(&self) -> usize {
        self.area.resolution
    }

    /// Get the value at the given cell, returning `0.0` if out of bounds.
    pub fn get(&self, ix: isize, iz: isize) -> f32 {
        let res = self.resolution() as isize;
        if ix < 0 || iz < 0 || ix >= res || iz >= res {
            return 0.0;
        }
        self.data[(iz * res + ix) as usize]
    }

    /// Set the value at the given cell. Out of bounds writes are ignored.
    pub fn set(&mut self, ix: usize, iz: usize, value: f32) {
        let res = self.resolution();
        if ix < res && iz < res {
            self.data[iz * res + ix] = value;
        }
    }

    /// Sample the matrix at a world position using the nearest cell.
    pub fn sample(&self, p: Vec2) -> f32 {
        let cell = self.area.cell_size();
        let local = (p - self.area.origin) / cell;
        self.get(local.x.floor() as isize, local.y.floor() as isize)
    }

    /// Borrow one row of cells.
    pub fn row(&self, iz: usize) -> &[f32] {
        let res = self.resolution();
        &self.data[iz * res..(iz + 1) * res]
    }

    /// Combine with another matrix of the same area cell by cell.
    pub fn zip_with(&mut self, other: &Matrix, f: impl Fn(f32, f32) -> f32) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = f(*a, *b);
        }
    }

    /// Smallest and largest value, or `None` for an empty matrix.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;

    fn area() -> ChunkArea {
        ChunkArea::new(Coord(0, 0), 4.0, 2)
    }

    #[test]
    fn new_initializes_with_zeroes() {
        let matrix = Matrix::new(area());
        assert_eq!(matrix.data.len(), 4);
        assert!(matrix.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn get_returns_zero_outside_bounds() {
        let matrix = Matrix::filled(area(), 1.0);
        assert_eq!(matrix.get(-1, 0), 0.0);
        assert_eq!(matrix.get(2, 2), 0.0);
        assert_eq!(matrix.get(1, 1), 1.0);
    }

    #[test]
    fn sample_uses_nearest_cell() {
        let matrix = Matrix::from_fn(area(), |p| p.x + 10.0 * p.y);
        assert_eq!(matrix.sample(Vec2::new(0.5, 0.5)), 1.0 + 10.0);
        assert_eq!(matrix.sample(Vec2::new(3.9, 0.1)), 3.0 + 10.0);
        assert_eq!(matrix.row(1), &[1.0 + 30.0, 3.0 + 30.0]);
    }

    #[test]
    fn zip_with_and_min_max() {
        let mut a = Matrix::filled(area(), 0.25);
        let mut b = Matrix::new(area());
        b.set(1, 0, 1.0);
        a.zip_with(&b, |x, y| x + y);
        assert_eq!(a.min_max(), Some((0.25, 1.25)));
    }
}
