//! Port definitions and link endpoints.
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// Semantic type carried by a port. Both ends of a link must agree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortType {
    /// A per-chunk scalar raster (heightfield or weight mask).
    Map,
    /// A per-chunk point set.
    Objects,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::Map => f.write_str("map"),
            PortType::Objects => f.write_str("objects"),
        }
    }
}

/// Definition of an input port.
#[derive(Clone, Debug, PartialEq)]
pub struct InputDef {
    pub name: String,
    pub ty: PortType,
    /// The node produces nothing while this input has no value.
    pub mandatory: bool,
    /// The node modifies this input in place, so it receives a private copy.
    pub writes_into_source: bool,
}

impl InputDef {
    pub fn new(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            name: name.into(),
            ty,
            mandatory: false,
            writes_into_source: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn writes_into_source(mut self) -> Self {
        self.writes_into_source = true;
        self
    }
}

/// Definition of an output port.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDef {
    pub name: String,
    pub ty: PortType,
}

impl OutputDef {
    pub fn new(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Handle of an input port: owning node plus port index.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputRef {
    pub node: NodeId,
    pub index: usize,
}

impl InputRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Handle of an output port: owning node plus port index.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    pub index: usize,
}

impl OutputRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}
