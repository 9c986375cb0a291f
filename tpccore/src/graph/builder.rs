use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::data::blob::Blob;
use crate::data::geometry::{Detector, WirePlaneId};
use crate::data::slice::Slice;
use crate::error::{CoreError, Result};
use crate::graph::event::{EventGraph, VertexId};
use crate::graph::node::Node;

/// Assembles tiling output into an event graph.
///
/// Channels and wires of the detector are added up front. Each blob is linked
/// to its slice and to every wire segment inside its wire-plane strips; the
/// channels follow through the wire-channel edges.
pub struct EventBuilder<'a> {
    detector: &'a Detector,
    graph: EventGraph,
    wires: FxHashMap<(WirePlaneId, i32), Vec<VertexId>>,
    slices: FxHashMap<i32, VertexId>,
    blobs: FxHashMap<i32, VertexId>,
}

impl<'a> EventBuilder<'a> {
    pub fn new(detector: &'a Detector) -> Result<Self> {
        let mut graph = EventGraph::new();
        let mut wires: FxHashMap<(WirePlaneId, i32), Vec<VertexId>> = FxHashMap::default();
        for channel in detector.channels() {
            let cv = graph.add_node(Node::Channel(channel.clone()));
            for wire in &channel.wires {
                let wv = graph.add_node(Node::Wire(wire.clone()));
                graph.add_edge(cv, wv)?;
                wires.entry((wire.plane, wire.index)).or_default().push(wv);
            }
        }
        Ok(EventBuilder {
            detector,
            graph,
            wires,
            slices: FxHashMap::default(),
            blobs: FxHashMap::default(),
        })
    }

    pub fn add_slice(&mut self, slice: impl Into<Arc<Slice>>) -> Result<VertexId> {
        let slice = slice.into();
        if self.slices.contains_key(&slice.ident) {
            return Err(CoreError::Duplicate { kind: "slice", ident: slice.ident });
        }
        let v = self.graph.add_node(Node::Slice(slice.clone()));
        self.slices.insert(slice.ident, v);
        Ok(v)
    }

    /// Add a blob whose slice was added before.
    pub fn add_blob(&mut self, blob: Blob) -> Result<VertexId> {
        if self.blobs.contains_key(&blob.ident) {
            return Err(CoreError::Duplicate { kind: "blob", ident: blob.ident });
        }
        let sv = *self
            .slices
            .get(&blob.slice.ident)
            .ok_or(CoreError::BlobSlice { blob: blob.ident, count: 0 })?;

        let mut attach = Vec::new();
        for (view, strip) in blob.shape.views() {
            let plane = blob.face.plane(view);
            self.detector.wires_in_plane(plane)?;
            for index in strip.bounds.0..strip.bounds.1 {
                if let Some(wvs) = self.wires.get(&(plane, index)) {
                    attach.extend(wvs.iter().copied());
                }
            }
        }

        let ident = blob.ident;
        let bv = self.graph.add_node(blob);
        self.graph.add_edge(sv, bv)?;
        for wv in attach {
            self.graph.add_edge(bv, wv)?;
        }
        self.blobs.insert(ident, bv);
        Ok(bv)
    }

    /// Join two blobs, given by identity, with a blob-blob edge.
    pub fn connect_blobs(&mut self, a: i32, b: i32) -> Result<()> {
        let va = self.blob_vertex(a)?;
        let vb = self.blob_vertex(b)?;
        self.graph.add_edge(va, vb)
    }

    pub fn blob_vertex(&self, ident: i32) -> Result<VertexId> {
        self.blobs
            .get(&ident)
            .copied()
            .ok_or_else(|| CoreError::Geometry(format!("no blob {}", ident)))
    }

    pub fn slice_vertex(&self, ident: i32) -> Option<VertexId> {
        self.slices.get(&ident).copied()
    }

    pub fn build(self) -> EventGraph {
        debug!("built event graph: {}", self.graph.summary());
        self.graph
    }
}
