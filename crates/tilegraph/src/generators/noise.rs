//! Value noise map source.
//!
//! Lattice values are hashed from integer world-space lattice coordinates, so adjacent
//! chunks agree along their shared border regardless of which chunk is generated first.
use glam::Vec2;

use crate::coord::mix_u64;
use crate::error::{Error, Result};
use crate::graph::generator::{Descriptor, GenContext, Generator};
use crate::graph::port::{OutputDef, PortType};
use crate::graph::value::Value;
use crate::matrix::Matrix;

/// Fractal value noise.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Noise {
    /// Seed of the lattice hash.
    pub seed: u64,
    /// World-space size of one lattice cell of the first octave.
    pub scale: f32,
    /// Number of octaves summed.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f32,
    /// Output is `offset + amplitude * noise`, with noise in [0, 1].
    pub amplitude: f32,
    pub offset: f32,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 3,
            persistence: 0.5,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

impl Noise {
    pub fn new(seed: u64, scale: f32) -> Self {
        Self {
            seed,
            scale,
            ..Default::default()
        }
    }

    #[inline]
    fn lattice(&self, octave: u32, x: i64, z: i64) -> f32 {
        let h = mix_u64(
            self.seed
                ^ (octave as u64).wrapping_mul(0xD6E8FEB86659FD93)
                ^ (x as u64).wrapping_mul(0x9E3779B97F4A7C15)
                ^ (z as u64).wrapping_mul(0xBF58476D1CE4E5B9),
        );
        (h >> 40) as f32 / (1u64 << 24) as f32
    }

    fn octave(&self, octave: u32, p: Vec2) -> f32 {
        let x0 = p.x.floor();
        let z0 = p.y.floor();
        let tx = smooth(p.x - x0);
        let tz = smooth(p.y - z0);
        let (ix, iz) = (x0 as i64, z0 as i64);
        let a = self.lattice(octave, ix, iz);
        let b = self.lattice(octave, ix + 1, iz);
        let c = self.lattice(octave, ix, iz + 1);
        let d = self.lattice(octave, ix + 1, iz + 1);
        let top = a + (b - a) * tx;
        let bottom = c + (d - c) * tx;
        top + (bottom - top) * tz
    }

    /// Normalized noise value in [0, 1] at a world position.
    pub fn sample(&self, p: Vec2) -> f32 {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let mut amp = 1.0;
        let mut freq = 1.0 / self.scale;
        for octave in 0..self.octaves.max(1) {
            sum += self.octave(octave, p * freq) * amp;
            norm += amp;
            amp *= self.persistence;
            freq *= 2.0;
        }
        sum / norm
    }
}

#[inline]
fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

impl Generator for Noise {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("noise", "Noise", "Map")
    }

    fn outputs(&self) -> Vec<OutputDef> {
        vec![OutputDef::new("map", PortType::Map)]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::Generate {
                name: "Noise".into(),
                message: format!("scale must be > 0, got {}", self.scale),
            });
        }
        let matrix = Matrix::from_fn(ctx.area(), |p| self.offset + self.amplitude * self.sample(p));
        ctx.set_output(0, Value::map(matrix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{ChunkArea, Coord};

    #[test]
    fn samples_stay_in_unit_range() {
        let noise = Noise::new(7, 13.0);
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 3.7 - 300.0, i as f32 * -1.3 + 40.0);
            let v = noise.sample(p);
            assert!((0.0..=1.0).contains(&v), "{v} at {p:?}");
        }
    }

    #[test]
    fn cells_sample_world_positions() {
        let noise = Noise::new(1, 20.0);
        for (coord, seed) in [(Coord(0, 0), 1), (Coord(1, 0), 2)] {
            let area = ChunkArea::new(coord, 10.0, 8);
            let mut ctx = GenContext::detached(area, seed, Vec::new(), 1);
            noise.generate(&mut ctx).unwrap();
            let map = ctx.output(0).and_then(Value::as_map).unwrap();
            assert_eq!(map.data.len(), 64);
            assert_eq!(map.get(0, 4), noise.sample(area.cell_center(0, 4)));
            assert_eq!(map.get(7, 7), noise.sample(area.cell_center(7, 7)));
        }
    }

    #[test]
    fn rejects_non_positive_scale() {
        let area = ChunkArea::new(Coord(0, 0), 1.0, 1);
        let mut ctx = GenContext::detached(area, 0, Vec::new(), 1);
        let noise = Noise::new(0, 0.0);
        assert!(matches!(noise.generate(&mut ctx), Err(Error::Generate { .. })));
    }
}
