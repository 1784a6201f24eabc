//! Uniform map source.
use crate::error::Result;
use crate::graph::generator::{Descriptor, GenContext, Generator};
use crate::graph::port::{OutputDef, PortType};
use crate::graph::value::Value;
use crate::matrix::Matrix;

/// Fills the whole chunk with one value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constant {
    pub value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Generator for Constant {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("constant", "Constant", "Map")
    }

    fn outputs(&self) -> Vec<OutputDef> {
        vec![OutputDef::new("map", PortType::Map)]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        let matrix = Matrix::filled(ctx.area(), self.value);
        ctx.set_output(0, Value::map(matrix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{ChunkArea, Coord};

    #[test]
    fn fills_every_cell() {
        let area = ChunkArea::new(Coord(3, -1), 10.0, 4);
        let mut ctx = GenContext::detached(area, 0, Vec::new(), 1);
        Constant::new(0.4).generate(&mut ctx).unwrap();
        let map = ctx.output(0).and_then(Value::as_map).expect("map output");
        assert_eq!(map.data.len(), 16);
        assert!(map.data.iter().all(|v| *v == 0.4));
        assert_eq!(map.area.coord, Coord(3, -1));
    }
}
