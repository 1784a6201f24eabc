//! Combine two maps cell by cell.
use crate::error::Result;
use crate::graph::generator::{Descriptor, GenContext, Generator};
use crate::graph::port::{InputDef, OutputDef, PortType};
use crate::graph::value::Value;

/// How two maps are combined.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum BlendMode {
    #[default]
    Add,
    Multiply,
    Min,
    Max,
    /// Take `b`, weighted by the mask.
    Lerp,
}

impl BlendMode {
    #[inline]
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BlendMode::Add => a + b,
            BlendMode::Multiply => a * b,
            BlendMode::Min => a.min(b),
            BlendMode::Max => a.max(b),
            BlendMode::Lerp => b,
        }
    }
}

/// Blends input `b` into input `a`.
///
/// With a mask linked, each cell moves from `a` toward the blended value by the mask
/// weight. Without `b` the node passes `a` through.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blend {
    pub mode: BlendMode,
}

impl Blend {
    pub fn new(mode: BlendMode) -> Self {
        Self { mode }
    }
}

impl Generator for Blend {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("blend", "Blend", "Map")
    }

    fn inputs(&self) -> Vec<InputDef> {
        vec![
            InputDef::new("a", PortType::Map)
                .mandatory()
                .writes_into_source(),
            InputDef::new("b", PortType::Map),
            InputDef::new("mask", PortType::Map),
        ]
    }

    fn outputs(&self) -> Vec<OutputDef> {
        vec![OutputDef::new("map", PortType::Map)]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        let Some(mut a) = ctx.take_input_map(0) else {
            return Ok(());
        };
        if let Some(b) = ctx.input_map(1) {
            let mask = ctx.input_map(2);
            for (i, (cell, other)) in a.data.iter_mut().zip(b.data.iter()).enumerate() {
                let blended = self.mode.apply(*cell, *other);
                let weight = mask.and_then(|m| m.data.get(i).copied()).unwrap_or(1.0);
                *cell += (blended - *cell) * weight.clamp(0.0, 1.0);
            }
        }
        ctx.set_output(0, Value::map(a));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{ChunkArea, Coord};
    use crate::matrix::Matrix;

    fn area() -> ChunkArea {
        ChunkArea::new(Coord(0, 0), 2.0, 2)
    }

    fn run(blend: Blend, inputs: Vec<Option<Value>>) -> Vec<f32> {
        let mut ctx = GenContext::detached(area(), 0, inputs, 1);
        blend.generate(&mut ctx).unwrap();
        ctx.output(0)
            .and_then(Value::as_map)
            .map(|m| m.data.clone())
            .unwrap_or_default()
    }

    #[test]
    fn modes_combine_cells() {
        let a = || Some(Value::map(Matrix::filled(area(), 0.5)));
        let b = || Some(Value::map(Matrix::filled(area(), 0.25)));
        assert_eq!(run(Blend::new(BlendMode::Add), vec![a(), b(), None]), vec![0.75; 4]);
        assert_eq!(run(Blend::new(BlendMode::Multiply), vec![a(), b(), None]), vec![0.125; 4]);
        assert_eq!(run(Blend::new(BlendMode::Min), vec![a(), b(), None]), vec![0.25; 4]);
        assert_eq!(run(Blend::new(BlendMode::Max), vec![a(), b(), None]), vec![0.5; 4]);
    }

    #[test]
    fn mask_weights_the_blend() {
        let mut mask = Matrix::new(area());
        mask.set(1, 0, 1.0);
        mask.set(0, 1, 0.5);
        let data = run(
            Blend::new(BlendMode::Lerp),
            vec![
                Some(Value::map(Matrix::filled(area(), 0.0))),
                Some(Value::map(Matrix::filled(area(), 1.0))),
                Some(Value::map(mask)),
            ],
        );
        assert_eq!(data, vec![0.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn missing_b_passes_a_through() {
        let data = run(
            Blend::default(),
            vec![Some(Value::map(Matrix::filled(area(), 0.3))), None, None],
        );
        assert_eq!(data, vec![0.3; 4]);
    }
}
