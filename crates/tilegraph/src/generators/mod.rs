//! Built-in generator kinds.
//!
//! These cover the node shapes the engine needs to be useful on its own: map sources,
//! a combiner, a point scatterer and the three sink kinds consumed by a backend. Hosts
//! add their own kinds by implementing [`crate::graph::generator::Generator`] and
//! registering them in a [`crate::graph::registry::GeneratorRegistry`].
use rand::RngCore;

pub mod blend;
pub mod constant;
pub mod noise;
pub mod outputs;
pub mod scatter;

pub use blend::{Blend, BlendMode};
pub use constant::Constant;
pub use noise::Noise;
pub use outputs::{HeightOutput, ObjectsOutput, TexturesOutput};
pub use scatter::Scatter;

/// Generate a random float in the range [0, 1).
#[inline]
pub(crate) fn rand01(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}
