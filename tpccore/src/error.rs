use thiserror::Error;

use crate::graph::node::NodeCode;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("node kind mismatch: expected '{expected}', found '{found}'")]
    NodeKind { expected: NodeCode, found: NodeCode },
    #[error("vertex {0} is not in the graph")]
    MissingVertex(usize),
    #[error("blob {blob} has {count} slice neighbors, expected exactly one")]
    BlobSlice { blob: i32, count: usize },
    #[error("geometry lookup failed: {0}")]
    Geometry(String),
    #[error("duplicate {kind} identity {ident}")]
    Duplicate { kind: &'static str, ident: i32 },
}
