//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid configuration, rejected graph mutations, failed generator passes and generic errors.
use thiserror::Error;

use crate::graph::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("link from node {source_node} to node {target} would create a cycle")]
    CyclicLink { source_node: NodeId, target: NodeId },

    #[error("graph already contains a '{kind}' output node")]
    DuplicateSink { kind: String },

    #[error("port type mismatch: output carries {output}, input expects {input}")]
    PortTypeMismatch { output: String, input: String },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} has no {direction} port {index}")]
    UnknownPort {
        node: NodeId,
        direction: &'static str,
        index: usize,
    },

    #[error("node {0} cannot be disabled")]
    NotDisableable(NodeId),

    #[error("node {node} is not a '{expected}' generator")]
    NodeTypeMismatch { node: NodeId, expected: &'static str },

    #[error("unknown generator type '{tag}'")]
    UnknownGenerator { tag: String },

    #[error("generator '{name}' failed: {message}")]
    Generate { name: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
