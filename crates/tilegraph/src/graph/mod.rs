//! The generator graph.
//!
//! A [`Graph`] is an arena of generator nodes addressed by stable [`NodeId`]s, plus a
//! table of links from input ports to output ports. Every mutation validates before it
//! touches the graph, so a rejected call leaves the graph exactly as it was.
//!
//! Workers evaluate against immutable snapshots handed out by [`SharedGraph`]; edits
//! replace the snapshot instead of mutating it in place.
use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod generator;
pub mod port;
pub mod registry;
pub mod value;

use generator::{Descriptor, Generator};
use port::{InputDef, InputRef, OutputDef, OutputRef};
use registry::GeneratorRegistry;
use value::SinkKind;

/// Stable handle of a node. Ids are never reused within one graph.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A generator placed in the graph together with its resolved port definitions.
#[derive(Clone, Debug)]
pub struct Node {
    generator: Arc<dyn Generator>,
    descriptor: Descriptor,
    enabled: bool,
    inputs: Vec<InputDef>,
    outputs: Vec<OutputDef>,
}

impl Node {
    fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            descriptor: generator.descriptor(),
            inputs: generator.inputs(),
            outputs: generator.outputs(),
            enabled: true,
            generator,
        }
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Downcast the generator to its concrete type.
    pub fn get<G: Generator>(&self) -> Option<&G> {
        let any: &dyn Any = self.generator.as_ref();
        any.downcast_ref::<G>()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn inputs(&self) -> &[InputDef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputDef] {
        &self.outputs
    }

    pub fn sink(&self) -> Option<SinkKind> {
        self.descriptor.sink
    }
}

/// Directed acyclic graph of generator nodes.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    slots: Vec<Option<Node>>,
    links: HashMap<InputRef, OutputRef>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a generator and return its id.
    ///
    /// Fails with [`Error::DuplicateSink`] if the generator is a singleton sink and the
    /// graph already holds a node of the same kind.
    pub fn add<G: Generator>(&mut self, generator: G) -> Result<NodeId> {
        self.add_shared(Arc::new(generator))
    }

    /// Add a boxed generator, e.g. one created by a [`GeneratorRegistry`].
    pub fn add_boxed(&mut self, generator: Box<dyn Generator>) -> Result<NodeId> {
        self.add_shared(Arc::from(generator))
    }

    fn add_shared(&mut self, generator: Arc<dyn Generator>) -> Result<NodeId> {
        let node = Node::new(generator);
        self.check_singleton(&node.descriptor, None)?;
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(node));
        Ok(id)
    }

    fn check_singleton(&self, descriptor: &Descriptor, except: Option<NodeId>) -> Result<()> {
        let Some(kind) = descriptor.sink.filter(|_| descriptor.singleton) else {
            return Ok(());
        };
        let clash = self
            .nodes()
            .any(|(id, n)| Some(id) != except && n.descriptor.tag == descriptor.tag);
        if clash {
            return Err(Error::DuplicateSink {
                kind: kind.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a node together with every link that touches it.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.node(id).ok_or(Error::UnknownNode(id))?;
        self.slots[id.slot()] = None;
        self.links
            .retain(|input, output| input.node != id && output.node != id);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.slot()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(Node::is_enabled)
    }

    fn input_def(&self, input: InputRef) -> Result<&InputDef> {
        let node = self.node(input.node).ok_or(Error::UnknownNode(input.node))?;
        node.inputs.get(input.index).ok_or(Error::UnknownPort {
            node: input.node,
            direction: "input",
            index: input.index,
        })
    }

    fn output_def(&self, output: OutputRef) -> Result<&OutputDef> {
        let node = self
            .node(output.node)
            .ok_or(Error::UnknownNode(output.node))?;
        node.outputs.get(output.index).ok_or(Error::UnknownPort {
            node: output.node,
            direction: "output",
            index: output.index,
        })
    }

    fn check_link(&self, from: OutputRef, to: InputRef) -> Result<()> {
        let output = self.output_def(from)?;
        let input = self.input_def(to)?;
        if output.ty != input.ty {
            return Err(Error::PortTypeMismatch {
                output: output.ty.to_string(),
                input: input.ty.to_string(),
            });
        }
        Ok(())
    }

    /// Connect an output to an input, replacing any link the input already had.
    ///
    /// Returns the replaced source. Fails with [`Error::CyclicLink`] when the source node
    /// already depends on the target node, regardless of which nodes are enabled.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<Option<OutputRef>> {
        self.check_link(from, to)?;
        if from.node == to.node || self.depends_on(from.node, to.node) {
            return Err(Error::CyclicLink {
                source_node: from.node,
                target: to.node,
            });
        }
        Ok(self.links.insert(to, from))
    }

    /// Disconnect an input. Returns the source it was linked to.
    pub fn unlink(&mut self, to: InputRef) -> Option<OutputRef> {
        self.links.remove(&to)
    }

    /// Output linked to `input`, if any.
    pub fn source(&self, input: InputRef) -> Option<OutputRef> {
        self.links.get(&input).copied()
    }

    /// All links as `(input, output)` pairs, sorted by input.
    pub fn links(&self) -> Vec<(InputRef, OutputRef)> {
        let mut links: Vec<_> = self.links.iter().map(|(i, o)| (*i, *o)).collect();
        links.sort_unstable();
        links
    }

    /// Nodes feeding `id` directly.
    pub fn sources(&self, id: NodeId) -> Vec<NodeId> {
        let mut sources: Vec<NodeId> = self
            .links
            .iter()
            .filter(|(input, _)| input.node == id)
            .map(|(_, output)| output.node)
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    /// Nodes reading from `id` directly.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        let mut dependents: Vec<NodeId> = self
            .links
            .iter()
            .filter(|(_, output)| output.node == id)
            .map(|(input, _)| input.node)
            .collect();
        dependents.sort_unstable();
        dependents.dedup();
        dependents
    }

    /// Whether `node` reads, directly or transitively, from `other`.
    pub fn depends_on(&self, node: NodeId, other: NodeId) -> bool {
        let mut stack = vec![node];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for source in self.sources(current) {
                if source == other {
                    return true;
                }
                stack.push(source);
            }
        }
        false
    }

    /// Enable or disable a node. Returns whether the flag changed.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<bool> {
        let node = self.node_mut(id)?;
        if !enabled && !node.descriptor.disableable {
            return Err(Error::NotDisableable(id));
        }
        let changed = node.enabled != enabled;
        node.enabled = enabled;
        Ok(changed)
    }

    /// Change the parameters of a node in place.
    ///
    /// The generator is copied, `f` runs on the copy, and the copy replaces the original.
    /// Port definitions are re-read afterwards; links whose port disappeared or changed
    /// type are dropped and returned.
    pub fn edit_node<G, F>(&mut self, id: NodeId, f: F) -> Result<Vec<InputRef>>
    where
        G: Generator + Clone,
        F: FnOnce(&mut G),
    {
        let node = self.node(id).ok_or(Error::UnknownNode(id))?;
        let mut generator = node
            .get::<G>()
            .cloned()
            .ok_or(Error::NodeTypeMismatch {
                node: id,
                expected: std::any::type_name::<G>(),
            })?;
        f(&mut generator);
        self.replace(id, Arc::new(generator))
    }

    fn replace(&mut self, id: NodeId, generator: Arc<dyn Generator>) -> Result<Vec<InputRef>> {
        let enabled = self.is_enabled(id);
        let mut node = Node::new(generator);
        node.enabled = enabled;
        self.check_singleton(&node.descriptor, Some(id))?;
        *self.node_mut(id)? = node;

        let stale: Vec<InputRef> = self
            .links
            .iter()
            .filter(|(input, output)| {
                (input.node == id || output.node == id) && self.check_link(**output, **input).is_err()
            })
            .map(|(input, _)| *input)
            .collect();
        for input in &stale {
            self.links.remove(input);
        }
        Ok(stale)
    }

    /// Ids of every sink node, in insertion order.
    pub fn sinks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes()
            .filter(|(_, n)| n.sink().is_some())
            .map(|(id, _)| id)
    }

    /// Ids of enabled sink nodes, in insertion order.
    pub fn enabled_sinks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes()
            .filter(|(_, n)| n.enabled && n.sink().is_some())
            .map(|(id, _)| id)
    }

    /// Sink kinds produced by enabled sink nodes.
    pub fn enabled_sink_kinds(&self) -> BTreeSet<SinkKind> {
        self.nodes()
            .filter(|(_, n)| n.enabled)
            .filter_map(|(_, n)| n.sink())
            .collect()
    }

    /// Check link typing, singleton sinks and acyclicity.
    ///
    /// Mutations keep these properties on their own; this is for graphs assembled from
    /// records.
    pub fn validate(&self) -> Result<()> {
        for (input, output) in self.links() {
            self.check_link(output, input)?;
        }

        let mut singletons: HashSet<&'static str> = HashSet::new();
        for (_, node) in self.nodes() {
            if let Some(kind) = node.sink().filter(|_| node.descriptor.singleton) {
                if !singletons.insert(node.descriptor.tag) {
                    return Err(Error::DuplicateSink {
                        kind: kind.to_string(),
                    });
                }
            }
        }

        for (input, output) in self.links() {
            if output.node == input.node || self.depends_on(output.node, input.node) {
                return Err(Error::CyclicLink {
                    source_node: output.node,
                    target: input.node,
                });
            }
        }
        Ok(())
    }

    /// Persistable description of the graph structure.
    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            nodes: self
                .nodes()
                .map(|(id, n)| NodeRecord {
                    id,
                    tag: n.descriptor.tag.to_string(),
                    enabled: n.enabled,
                })
                .collect(),
            links: self
                .links()
                .into_iter()
                .map(|(to, from)| LinkRecord { from, to })
                .collect(),
        }
    }

    /// Rebuild a graph from a record, creating each node through `registry`.
    ///
    /// Node ids are preserved. Nodes come back with default parameters.
    pub fn from_record(record: &GraphRecord, registry: &GeneratorRegistry) -> Result<Self> {
        let mut graph = Graph::new();
        for entry in &record.nodes {
            let slot = entry.id.slot();
            if graph.slots.len() <= slot {
                graph.slots.resize_with(slot + 1, || None);
            }
            if graph.slots[slot].is_some() {
                return Err(Error::Other(format!(
                    "record lists node {} twice",
                    entry.id
                )));
            }
            let mut node = Node::new(Arc::from(registry.create(&entry.tag)?));
            node.enabled = entry.enabled || !node.descriptor.disableable;
            graph.slots[slot] = Some(node);
        }
        for link in &record.links {
            if graph.links.insert(link.to, link.from).is_some() {
                return Err(Error::Other(format!(
                    "record links input {} of node {} twice",
                    link.to.index, link.to.node
                )));
            }
        }
        graph.validate()?;
        Ok(graph)
    }
}

/// Persisted node entry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub tag: String,
    pub enabled: bool,
}

/// Persisted link entry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRecord {
    pub from: OutputRef,
    pub to: InputRef,
}

/// Persistable structure of a [`Graph`]: node kinds, enabled flags and links.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphRecord {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

/// A graph shared between the session and its workers.
///
/// Readers take cheap snapshots; writers build a new graph and swap it in, so a worker
/// always evaluates one consistent version.
#[derive(Clone, Debug, Default)]
pub struct SharedGraph(Arc<RwLock<Arc<Graph>>>);

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(graph))))
    }

    /// Current version of the graph.
    pub fn snapshot(&self) -> Arc<Graph> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f` to a copy of the graph and publish the copy if `f` succeeds.
    pub fn update<R>(&self, f: impl FnOnce(&mut Graph) -> Result<R>) -> Result<R> {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Graph::clone(&guard);
        let result = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    use super::*;
    use crate::generators::{Blend, Constant, HeightOutput, TexturesOutput};

    fn out(node: NodeId, index: usize) -> OutputRef {
        OutputRef::new(node, index)
    }

    fn inp(node: NodeId, index: usize) -> InputRef {
        InputRef::new(node, index)
    }

    #[test]
    fn node_id_displays_with_hash() {
        assert_eq!(NodeId(4).to_string(), "#4");
    }

    #[test]
    fn link_and_query_dependencies() {
        let mut graph = Graph::new();
        let a = graph.add(Constant::new(0.1)).unwrap();
        let b = graph.add(Blend::default()).unwrap();
        let h = graph.add(HeightOutput).unwrap();
        graph.link(out(a, 0), inp(b, 0)).unwrap();
        graph.link(out(b, 0), inp(h, 0)).unwrap();

        assert_eq!(graph.sources(b), vec![a]);
        assert_eq!(graph.dependents(a), vec![b]);
        assert!(graph.depends_on(h, a));
        assert!(!graph.depends_on(a, h));
        assert_eq!(graph.sinks().collect::<Vec<_>>(), vec![h]);
    }

    #[test]
    fn cyclic_link_is_rejected_and_graph_unchanged() {
        let mut graph = Graph::new();
        let a = graph.add(Blend::default()).unwrap();
        let b = graph.add(Blend::default()).unwrap();
        graph.link(out(a, 0), inp(b, 0)).unwrap();
        let before = graph.links();

        let err = graph.link(out(b, 0), inp(a, 1)).unwrap_err();
        assert!(matches!(err, Error::CyclicLink { source_node, target } if source_node == b && target == a));
        let err = graph.link(out(a, 0), inp(a, 1)).unwrap_err();
        assert!(matches!(err, Error::CyclicLink { .. }));
        assert_eq!(graph.links(), before);
    }

    #[test]
    fn cycle_check_ignores_disabled_nodes() {
        let mut graph = Graph::new();
        let a = graph.add(Blend::default()).unwrap();
        let b = graph.add(Blend::default()).unwrap();
        graph.link(out(a, 0), inp(b, 0)).unwrap();
        graph.set_enabled(a, false).unwrap();
        assert!(graph.link(out(b, 0), inp(a, 0)).is_err());
    }

    #[test]
    fn random_link_sequences_stay_acyclic() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut graph = Graph::new();
            let ids: Vec<NodeId> = (0..8).map(|_| graph.add(Blend::default()).unwrap()).collect();
            for _ in 0..60 {
                let from = ids[rng.next_u32() as usize % ids.len()];
                let to = ids[rng.next_u32() as usize % ids.len()];
                let index = rng.next_u32() as usize % 3;
                let before = graph.links();
                if graph.link(out(from, 0), inp(to, index)).is_err() {
                    assert_eq!(graph.links(), before);
                }
                graph.validate().expect("graph stays valid");
            }
        }
    }

    #[test]
    fn type_mismatch_and_unknown_ports() {
        let mut graph = Graph::new();
        let c = graph.add(Constant::new(0.0)).unwrap();
        let s = graph.add(crate::generators::Scatter::default()).unwrap();
        let h = graph.add(HeightOutput).unwrap();
        assert!(matches!(
            graph.link(out(s, 0), inp(h, 0)),
            Err(Error::PortTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.link(out(c, 5), inp(h, 0)),
            Err(Error::UnknownPort { direction: "output", .. })
        ));
        assert!(matches!(
            graph.link(out(c, 0), inp(NodeId(99), 0)),
            Err(Error::UnknownNode(NodeId(99)))
        ));
    }

    #[test]
    fn singleton_sinks_are_unique() {
        let mut graph = Graph::new();
        graph.add(HeightOutput).unwrap();
        assert!(matches!(
            graph.add(HeightOutput),
            Err(Error::DuplicateSink { .. })
        ));
        assert_eq!(graph.len(), 1);
    }

    #[derive(Debug, Clone)]
    struct Pinned;

    impl Generator for Pinned {
        fn descriptor(&self) -> Descriptor {
            Descriptor::new("pinned", "Pinned", "Test").always_enabled()
        }

        fn generate(&self, _ctx: &mut generator::GenContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn set_enabled_reports_changes() {
        let mut graph = Graph::new();
        let p = graph.add(Pinned).unwrap();
        let h = graph.add(HeightOutput).unwrap();
        assert!(matches!(
            graph.set_enabled(p, false),
            Err(Error::NotDisableable(_))
        ));
        assert!(graph.set_enabled(h, false).unwrap());
        assert!(!graph.set_enabled(h, false).unwrap());
        assert!(!graph.is_enabled(h));
        assert!(graph.enabled_sink_kinds().is_empty());
        assert_eq!(graph.sinks().count(), 1);
    }

    #[test]
    fn remove_drops_links_and_keeps_ids() {
        let mut graph = Graph::new();
        let a = graph.add(Constant::new(0.0)).unwrap();
        let h = graph.add(HeightOutput).unwrap();
        graph.link(out(a, 0), inp(h, 0)).unwrap();
        graph.remove(a).unwrap();
        assert!(graph.links().is_empty());
        assert!(!graph.contains(a));
        let b = graph.add(Constant::new(1.0)).unwrap();
        assert_ne!(a, b);
        assert!(matches!(graph.remove(a), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn edit_node_drops_links_to_removed_layers() {
        let mut graph = Graph::new();
        let c = graph.add(Constant::new(0.2)).unwrap();
        let t = graph
            .add(TexturesOutput::with_layers(["grass", "rock"]))
            .unwrap();
        graph.link(out(c, 0), inp(t, 0)).unwrap();
        graph.link(out(c, 0), inp(t, 1)).unwrap();

        let dropped = graph
            .edit_node::<TexturesOutput, _>(t, |g| g.layers.truncate(1))
            .unwrap();
        assert_eq!(dropped, vec![inp(t, 1)]);
        assert_eq!(graph.source(inp(t, 0)), Some(out(c, 0)));
        assert_eq!(graph.node(t).unwrap().inputs().len(), 1);

        graph
            .edit_node::<Constant, _>(c, |g| g.value = 0.9)
            .unwrap();
        assert_eq!(graph.node(c).unwrap().get::<Constant>().unwrap().value, 0.9);
        assert!(matches!(
            graph.edit_node::<Constant, _>(t, |_| {}),
            Err(Error::NodeTypeMismatch { .. })
        ));
    }

    #[test]
    fn record_rebuilds_structure() {
        let registry = GeneratorRegistry::with_builtins();
        let mut graph = Graph::new();
        let a = graph.add(Constant::new(0.5)).unwrap();
        let b = graph.add(Blend::default()).unwrap();
        let h = graph.add(HeightOutput).unwrap();
        graph.link(out(a, 0), inp(b, 0)).unwrap();
        graph.link(out(b, 0), inp(h, 0)).unwrap();
        graph.set_enabled(b, false).unwrap();
        graph.remove(a).unwrap();

        let record = graph.to_record();
        let rebuilt = Graph::from_record(&record, &registry).unwrap();
        assert_eq!(rebuilt.to_record(), record);
        assert!(!rebuilt.is_enabled(b));
        assert!(!rebuilt.contains(a));
    }

    #[test]
    fn record_with_cycle_fails_validation() {
        let registry = GeneratorRegistry::with_builtins();
        let record = GraphRecord {
            nodes: vec![
                NodeRecord {
                    id: NodeId(0),
                    tag: "blend".into(),
                    enabled: true,
                },
                NodeRecord {
                    id: NodeId(1),
                    tag: "blend".into(),
                    enabled: true,
                },
            ],
            links: vec![
                LinkRecord {
                    from: out(NodeId(0), 0),
                    to: inp(NodeId(1), 0),
                },
                LinkRecord {
                    from: out(NodeId(1), 0),
                    to: inp(NodeId(0), 0),
                },
            ],
        };
        assert!(matches!(
            Graph::from_record(&record, &registry),
            Err(Error::CyclicLink { .. })
        ));
    }

    #[test]
    fn shared_graph_update_is_transactional() {
        let shared = SharedGraph::new(Graph::new());
        let before = shared.snapshot();
        let id = shared.update(|g| g.add(HeightOutput)).unwrap();
        assert!(shared.update(|g| g.add(HeightOutput)).is_err());
        let after = shared.snapshot();
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert!(after.contains(id));
    }
}
