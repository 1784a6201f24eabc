//! Random point placement with a minimum spacing.
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;
use crate::generators::rand01;
use crate::graph::generator::{Descriptor, GenContext, Generator};
use crate::graph::port::{InputDef, OutputDef, PortType};
use crate::graph::value::Value;
use crate::spatial::SpatialHash;

/// Places up to `count` objects per chunk, rejecting candidates closer than
/// `min_distance` to an accepted one. An optional density map gives the acceptance
/// probability at each candidate position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Scatter {
    pub count: usize,
    pub min_distance: f32,
    /// Candidates tried per requested object before giving up.
    pub attempts: usize,
}

impl Default for Scatter {
    fn default() -> Self {
        Self {
            count: 64,
            min_distance: 2.0,
            attempts: 8,
        }
    }
}

impl Scatter {
    pub fn new(count: usize, min_distance: f32) -> Self {
        Self {
            count,
            min_distance,
            ..Default::default()
        }
    }

    fn hash_resolution(&self, size: f32) -> usize {
        if self.min_distance > 0.0 {
            ((size / self.min_distance).ceil() as usize).clamp(1, 64)
        } else {
            16
        }
    }
}

impl Generator for Scatter {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("scatter", "Scatter", "Objects")
    }

    fn inputs(&self) -> Vec<InputDef> {
        vec![InputDef::new("density", PortType::Map)]
    }

    fn outputs(&self) -> Vec<OutputDef> {
        vec![OutputDef::new("objects", PortType::Objects)]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        let area = ctx.area();
        let mut rng = StdRng::seed_from_u64(ctx.seed());
        let mut hash = SpatialHash::new(area.origin, area.size, self.hash_resolution(area.size));
        let density = ctx.input_map(0);

        let budget = self.count.saturating_mul(self.attempts.max(1));
        for attempt in 0..budget {
            if hash.len() >= self.count {
                break;
            }
            if attempt % 64 == 0 && ctx.is_stopped() {
                return Ok(());
            }
            let pos = hash.clamp(area.origin + Vec2::new(rand01(&mut rng), rand01(&mut rng)) * area.size);
            let roll = rand01(&mut rng);
            if density.is_some_and(|d| roll >= d.sample(pos)) {
                continue;
            }
            if self.min_distance > 0.0 && hash.is_any_obj_in_range(pos, self.min_distance) {
                continue;
            }
            let rotation = rand01(&mut rng) * std::f32::consts::TAU;
            hash.add(pos, 0.0, rotation, 1.0);
        }

        ctx.set_output(0, Value::objects(hash));
        Ok(())
    }
}
