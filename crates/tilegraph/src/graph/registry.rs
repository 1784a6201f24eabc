//! Registration table mapping generator tags to constructors.
//!
//! Persisted graphs reference node kinds by [`Descriptor::tag`]. A [`GeneratorRegistry`] is
//! built once at start-up and used to recreate nodes from those tags.
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::generators;
use crate::graph::generator::{Descriptor, Generator};

/// Constructor for a generator with default parameters.
pub type Constructor = fn() -> Box<dyn Generator>;

struct RegistryEntry {
    descriptor: Descriptor,
    construct: Constructor,
}

/// Table of known generator kinds.
#[derive(Default)]
pub struct GeneratorRegistry {
    entries: BTreeMap<&'static str, RegistryEntry>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Creates a registry with every built-in generator kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_default::<generators::Constant>();
        registry.register_default::<generators::Noise>();
        registry.register_default::<generators::Blend>();
        registry.register_default::<generators::Scatter>();
        registry.register_default::<generators::HeightOutput>();
        registry.register_default::<generators::TexturesOutput>();
        registry.register_default::<generators::ObjectsOutput>();
        registry
    }

    /// Registers a constructor. An existing entry with the same tag is replaced.
    pub fn register(&mut self, construct: Constructor) -> &mut Self {
        let descriptor = construct().descriptor();
        self.entries.insert(
            descriptor.tag,
            RegistryEntry {
                descriptor,
                construct,
            },
        );
        self
    }

    /// Registers a generator type through its [`Default`] value.
    pub fn register_default<G: Generator + Default>(&mut self) -> &mut Self {
        self.register(|| Box::new(G::default()))
    }

    /// Creates a generator with default parameters from its tag.
    pub fn create(&self, tag: &str) -> Result<Box<dyn Generator>> {
        self.entries
            .get(tag)
            .map(|entry| (entry.construct)())
            .ok_or_else(|| Error::UnknownGenerator {
                tag: tag.to_string(),
            })
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors of all registered kinds, sorted by tag.
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    /// Descriptors belonging to one menu group.
    pub fn group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Descriptor> + 'a {
        self.descriptors().filter(move |d| d.group == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_tag() {
        let registry = GeneratorRegistry::with_builtins();
        assert_eq!(registry.len(), 7);
        for tag in ["constant", "noise", "blend", "scatter", "height_output"] {
            let generator = registry.create(tag).expect("builtin exists");
            assert_eq!(generator.descriptor().tag, tag);
        }
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let registry = GeneratorRegistry::new();
        assert!(registry.is_empty());
        let err = registry.create("erosion").expect_err("not registered");
        assert!(matches!(err, Error::UnknownGenerator { ref tag } if tag == "erosion"));
    }

    #[test]
    fn group_filters_descriptors() {
        let registry = GeneratorRegistry::with_builtins();
        let outputs: Vec<_> = registry.group("Output").map(|d| d.tag).collect();
        assert_eq!(
            outputs,
            vec!["height_output", "objects_output", "textures_output"]
        );
    }
}
