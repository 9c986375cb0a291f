use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::blob::Blob;
use crate::data::channel::{Channel, Wire};
use crate::data::measure::Measure;
use crate::data::slice::Slice;
use crate::error::{CoreError, Result};

/// Discriminant of an event graph vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeCode {
    Channel,
    Wire,
    Blob,
    Slice,
    Measure,
}

impl NodeCode {
    pub const ALL: [NodeCode; 5] = [
        NodeCode::Channel,
        NodeCode::Wire,
        NodeCode::Blob,
        NodeCode::Slice,
        NodeCode::Measure,
    ];

    /// Single character code, `c`, `w`, `b`, `s` or `m`.
    pub fn as_char(&self) -> char {
        match self {
            NodeCode::Channel => 'c',
            NodeCode::Wire => 'w',
            NodeCode::Blob => 'b',
            NodeCode::Slice => 's',
            NodeCode::Measure => 'm',
        }
    }

    pub fn from_char(code: char) -> Option<NodeCode> {
        NodeCode::ALL.iter().copied().find(|c| c.as_char() == code)
    }
}

impl fmt::Display for NodeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Payload of an event graph vertex.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Channel(Arc<Channel>),
    Wire(Arc<Wire>),
    Blob(Arc<Blob>),
    Slice(Arc<Slice>),
    Measure(Arc<Measure>),
}

impl Node {
    pub fn code(&self) -> NodeCode {
        match self {
            Node::Channel(_) => NodeCode::Channel,
            Node::Wire(_) => NodeCode::Wire,
            Node::Blob(_) => NodeCode::Blob,
            Node::Slice(_) => NodeCode::Slice,
            Node::Measure(_) => NodeCode::Measure,
        }
    }

    pub fn ident(&self) -> i32 {
        match self {
            Node::Channel(c) => c.ident,
            Node::Wire(w) => w.ident,
            Node::Blob(b) => b.ident,
            Node::Slice(s) => s.ident,
            Node::Measure(m) => m.ident,
        }
    }

    fn mismatch(&self, expected: NodeCode) -> CoreError {
        CoreError::NodeKind { expected, found: self.code() }
    }

    pub fn as_channel(&self) -> Result<&Arc<Channel>> {
        match self {
            Node::Channel(c) => Ok(c),
            _ => Err(self.mismatch(NodeCode::Channel)),
        }
    }

    pub fn as_wire(&self) -> Result<&Arc<Wire>> {
        match self {
            Node::Wire(w) => Ok(w),
            _ => Err(self.mismatch(NodeCode::Wire)),
        }
    }

    pub fn as_blob(&self) -> Result<&Arc<Blob>> {
        match self {
            Node::Blob(b) => Ok(b),
            _ => Err(self.mismatch(NodeCode::Blob)),
        }
    }

    pub fn as_slice(&self) -> Result<&Arc<Slice>> {
        match self {
            Node::Slice(s) => Ok(s),
            _ => Err(self.mismatch(NodeCode::Slice)),
        }
    }

    pub fn as_measure(&self) -> Result<&Arc<Measure>> {
        match self {
            Node::Measure(m) => Ok(m),
            _ => Err(self.mismatch(NodeCode::Measure)),
        }
    }
}

impl From<Channel> for Node {
    fn from(c: Channel) -> Self {
        Node::Channel(Arc::new(c))
    }
}

impl From<Wire> for Node {
    fn from(w: Wire) -> Self {
        Node::Wire(Arc::new(w))
    }
}

impl From<Blob> for Node {
    fn from(b: Blob) -> Self {
        Node::Blob(Arc::new(b))
    }
}

impl From<Slice> for Node {
    fn from(s: Slice) -> Self {
        Node::Slice(Arc::new(s))
    }
}

impl From<Measure> for Node {
    fn from(m: Measure) -> Self {
        Node::Measure(Arc::new(m))
    }
}
