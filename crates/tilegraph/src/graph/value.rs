//! Values flowing through ports and the data handed to the backend.
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::graph::port::PortType;
use crate::matrix::Matrix;
use crate::spatial::SpatialHash;

/// A cached output value. Cloning shares the payload; use [`Value::deep_copy`] for a private copy.
#[derive(Clone, Debug)]
pub enum Value {
    Map(Arc<Matrix>),
    Objects(Arc<SpatialHash>),
}

impl Value {
    pub fn map(matrix: Matrix) -> Self {
        Value::Map(Arc::new(matrix))
    }

    pub fn objects(hash: SpatialHash) -> Self {
        Value::Objects(Arc::new(hash))
    }

    pub fn port_type(&self) -> PortType {
        match self {
            Value::Map(_) => PortType::Map,
            Value::Objects(_) => PortType::Objects,
        }
    }

    pub fn as_map(&self) -> Option<&Arc<Matrix>> {
        match self {
            Value::Map(m) => Some(m),
            Value::Objects(_) => None,
        }
    }

    pub fn as_objects(&self) -> Option<&Arc<SpatialHash>> {
        match self {
            Value::Objects(h) => Some(h),
            Value::Map(_) => None,
        }
    }

    /// A copy that shares no storage with `self`.
    pub fn deep_copy(&self) -> Self {
        match self {
            Value::Map(m) => Value::Map(Arc::new(Matrix::clone(m))),
            Value::Objects(h) => Value::Objects(Arc::new(SpatialHash::clone(h))),
        }
    }
}

/// Terminal output kinds consumed by the backend.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SinkKind {
    Height,
    Textures,
    Objects,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Height => f.write_str("height"),
            SinkKind::Textures => f.write_str("textures"),
            SinkKind::Objects => f.write_str("objects"),
        }
    }
}

/// A finished sink product waiting to be applied.
#[derive(Clone, Debug)]
pub enum ApplyData {
    Height(Arc<Matrix>),
    Textures(Vec<(String, Arc<Matrix>)>),
    Objects(Arc<SpatialHash>),
}

impl ApplyData {
    pub fn kind(&self) -> SinkKind {
        match self {
            ApplyData::Height(_) => SinkKind::Height,
            ApplyData::Textures(_) => SinkKind::Textures,
            ApplyData::Objects(_) => SinkKind::Objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::coord::{ChunkArea, Coord};

    #[test]
    fn deep_copy_does_not_share_storage() {
        let value = Value::map(Matrix::filled(ChunkArea::new(Coord(0, 0), 1.0, 2), 0.5));
        let shared = value.clone();
        let copy = value.deep_copy();
        let (Value::Map(a), Value::Map(b), Value::Map(c)) = (&value, &shared, &copy) else {
            panic!("expected maps");
        };
        assert!(Arc::ptr_eq(a, b));
        assert!(!Arc::ptr_eq(a, c));
        assert_eq!(a.data, c.data);
    }

    #[test]
    fn port_type_follows_variant() {
        let hash = SpatialHash::new(Vec2::ZERO, 1.0, 1);
        assert_eq!(Value::objects(hash).port_type(), PortType::Objects);
        let data = ApplyData::Textures(Vec::new());
        assert_eq!(data.kind(), SinkKind::Textures);
    }
}
