//! Sink generators whose products are handed to the backend.
use crate::error::Result;
use crate::graph::generator::{Descriptor, GenContext, Generator};
use crate::graph::port::{InputDef, PortType};
use crate::graph::value::{ApplyData, SinkKind, Value};

/// Heightfield sink. At most one per graph.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeightOutput;

impl Generator for HeightOutput {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("height_output", "Height", "Output").sink(SinkKind::Height, true)
    }

    fn inputs(&self) -> Vec<InputDef> {
        vec![InputDef::new("height", PortType::Map).mandatory()]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        if let Some(map) = ctx.input(0).and_then(Value::as_map).cloned() {
            ctx.submit(ApplyData::Height(map));
        }
        Ok(())
    }
}

/// Texture weight sink with one input per named layer. At most one per graph.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TexturesOutput {
    pub layers: Vec<String>,
}

impl Default for TexturesOutput {
    fn default() -> Self {
        Self::with_layers(["base"])
    }
}

impl TexturesOutput {
    pub fn with_layers<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            layers: layers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Generator for TexturesOutput {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("textures_output", "Textures", "Output").sink(SinkKind::Textures, true)
    }

    fn inputs(&self) -> Vec<InputDef> {
        self.layers
            .iter()
            .map(|name| InputDef::new(name.clone(), PortType::Map))
            .collect()
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                ctx.input(i)
                    .and_then(Value::as_map)
                    .map(|m| (name.clone(), m.clone()))
            })
            .collect();
        ctx.submit(ApplyData::Textures(layers));
        Ok(())
    }
}

/// Object set sink.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectsOutput;

impl Generator for ObjectsOutput {
    fn descriptor(&self) -> Descriptor {
        Descriptor::new("objects_output", "Objects", "Output").sink(SinkKind::Objects, false)
    }

    fn inputs(&self) -> Vec<InputDef> {
        vec![InputDef::new("objects", PortType::Objects).mandatory()]
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<()> {
        if let Some(hash) = ctx.input(0).and_then(Value::as_objects).cloned() {
            ctx.submit(ApplyData::Objects(hash));
        }
        Ok(())
    }
}
