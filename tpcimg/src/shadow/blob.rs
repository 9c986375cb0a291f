use itertools::Itertools;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use tpccore::data::geometry::WirePlaneId;
use tpccore::graph::directed::DirectedView;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::{Node, NodeCode};

/// Overlap of two blobs in one plane, `[beg, end)` in wire-in-plane or
/// channel index units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BlobShadowEdge {
    pub plane: WirePlaneId,
    pub beg: i32,
    pub end: i32,
}

impl BlobShadowEdge {
    fn grow(&mut self, index: i32) {
        self.beg = self.beg.min(index);
        self.end = self.end.max(index + 1);
    }

    pub fn width(&self) -> i32 {
        self.end - self.beg
    }
}

/// Blob vertices of one frame joined by their per-plane shadow edges.
#[derive(Clone, Debug, Default)]
pub struct BlobShadowGraph {
    graph: UnGraph<VertexId, BlobShadowEdge>,
    index: FxHashMap<VertexId, NodeIndex>,
    lookup: FxHashMap<(NodeIndex, NodeIndex, WirePlaneId), EdgeIndex>,
}

impl BlobShadowGraph {
    fn add_vertex(&mut self, blob: VertexId) -> NodeIndex {
        let graph = &mut self.graph;
        *self.index.entry(blob).or_insert_with(|| graph.add_node(blob))
    }

    /// Add or extend the edge of a blob pair in `plane` to cover `index`.
    fn extend(&mut self, a: VertexId, b: VertexId, plane: WirePlaneId, index: i32) {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let na = self.add_vertex(a);
        let nb = self.add_vertex(b);
        match self.lookup.get(&(na, nb, plane)) {
            Some(e) => self.graph[*e].grow(index),
            None => {
                let e = self.graph.add_edge(na, nb, BlobShadowEdge { plane, beg: index, end: index + 1 });
                self.lookup.insert((na, nb, plane), e);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Event graph handles of the blob vertices.
    pub fn blobs(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.node_weights().copied()
    }

    /// Edges as (blob, blob, edge), lower blob handle first.
    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId, &BlobShadowEdge)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], e.weight()))
    }

    /// The edge between two blobs in one plane.
    pub fn edge(&self, a: VertexId, b: VertexId, plane: WirePlaneId) -> Option<&BlobShadowEdge> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let na = self.index.get(&a)?;
        let nb = self.index.get(&b)?;
        self.lookup.get(&(*na, *nb, plane)).map(|e| &self.graph[*e])
    }

    pub fn degree(&self, blob: VertexId) -> usize {
        self.index.get(&blob).map_or(0, |n| self.graph.edges(*n).count())
    }
}

/// Plane and in-plane index of a leaf vertex.
fn leaf_position(node: &Node) -> Option<(WirePlaneId, i32)> {
    match node {
        Node::Wire(w) => Some((w.plane, w.index)),
        Node::Channel(c) => Some((c.plane, c.index)),
        _ => None,
    }
}

/// Plane of a shadow edge between two blobs through a leaf in `plane`.
///
/// A channel belongs to the plane of its first wire segment. Two blobs of
/// the same face read it through the segment in their own face, so the edge
/// takes that face's plane of the same layer.
fn shadow_plane(a: &Node, b: &Node, plane: WirePlaneId) -> WirePlaneId {
    match (a, b) {
        (Node::Blob(x), Node::Blob(y)) if x.face.ident == y.face.ident => x.face.plane(plane.layer),
        _ => plane,
    }
}

/// Build the blob shadow graph at wire (`'w'`) or channel (`'c'`) granularity.
///
/// # Description
///
/// For every slice, blobs that reach the same wire (or channel) produce or
/// extend an edge in that leaf's plane. Every blob of the event graph is a
/// vertex, blobs without shared leaves stay isolated. Any other code yields
/// an empty graph.
///
/// # Arguments
///
/// * `eg` - The event graph.
/// * `code` - Leaf granularity, `'w'` or `'c'`.
///
pub fn shadow(eg: &EventGraph, code: char) -> BlobShadowGraph {
    let mut bsg = BlobShadowGraph::default();
    let leaf_code = match NodeCode::from_char(code) {
        Some(c @ (NodeCode::Wire | NodeCode::Channel)) => c,
        _ => {
            debug!("blob shadow: ignoring unknown shadow code '{}'", code);
            return bsg;
        }
    };

    let view = DirectedView::new(eg);
    let inner = eg.inner();
    for blob in eg.vertices_of(NodeCode::Blob) {
        bsg.add_vertex(blob);
    }

    for slice in eg.vertices_of(NodeCode::Slice) {
        let blobs: Vec<VertexId> = view
            .successors(slice)
            .into_iter()
            .filter(|v| inner[*v].code() == NodeCode::Blob)
            .collect();
        if blobs.len() < 2 {
            continue;
        }

        let mut leaf_blobs: FxHashMap<VertexId, Vec<VertexId>> = FxHashMap::default();
        for blob in &blobs {
            for leaf in view.reachable(*blob, leaf_code) {
                leaf_blobs.entry(leaf).or_default().push(*blob);
            }
        }

        for (leaf, sharing) in leaf_blobs.iter().sorted_by_key(|(leaf, _)| **leaf) {
            if sharing.len() < 2 {
                continue;
            }
            let Some((plane, index)) = leaf_position(&inner[*leaf]) else {
                continue;
            };
            for (a, b) in sharing.iter().tuple_combinations() {
                let plane = shadow_plane(&inner[*a], &inner[*b], plane);
                bsg.extend(*a, *b, plane, index);
            }
        }
        trace!("blob shadow: slice {:?} with {} blobs", slice, blobs.len());
    }

    debug!(
        "blob shadow '{}': {} blobs, {} edges",
        code,
        bsg.node_count(),
        bsg.edge_count()
    );
    bsg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tpccore::data::blob::{Blob, BlobShape};
    use tpccore::data::geometry::{Detector, Face, WirePlaneLayer};
    use tpccore::data::measurement::Measurement;
    use tpccore::data::slice::Slice;
    use tpccore::graph::builder::EventBuilder;

    fn three_blobs() -> (EventGraph, Vec<VertexId>) {
        let det = Detector::uniform(Face::new(0, 0, 0), [10, 10, 10], 0, 1.0).unwrap();
        let face = det.face(0).unwrap().clone();
        let mut builder = EventBuilder::new(&det).unwrap();
        let slice = Arc::new(Slice::default());
        builder.add_slice(slice.clone()).unwrap();
        // b0 and b1 share only wire 2 of the W plane.
        let b0 = BlobShape::new(vec![tpccore::data::blob::Strip::new(4, 0, 3)]);
        let b1 = BlobShape::new(vec![tpccore::data::blob::Strip::new(4, 2, 4)]);
        let b2 = BlobShape::new(vec![tpccore::data::blob::Strip::new(4, 6, 8)]);
        let mut out = Vec::new();
        for (i, shape) in [b0, b1, b2].into_iter().enumerate() {
            let blob = Blob::new(i as i32, Measurement::new(1.0, 0.0), slice.clone(), face.clone(), shape);
            out.push(builder.add_blob(blob).unwrap());
        }
        (builder.build(), out)
    }

    #[test]
    fn test_single_shared_wire() {
        let (eg, blobs) = three_blobs();
        let bsg = shadow(&eg, 'w');
        assert_eq!(bsg.node_count(), 3);
        assert_eq!(bsg.edge_count(), 1);
        let (a, b, edge) = bsg.edges().next().unwrap();
        assert_eq!((a, b), (blobs[0], blobs[1]));
        assert_eq!(edge.plane.layer, WirePlaneLayer::W);
        assert_eq!(edge.end - edge.beg, 1);
        assert_eq!(edge.beg, 2);
        assert_eq!(bsg.degree(blobs[2]), 0);
    }

    #[test]
    fn test_unknown_code_is_empty() {
        let (eg, _) = three_blobs();
        let bsg = shadow(&eg, 'x');
        assert_eq!(bsg.node_count(), 0);
        assert_eq!(bsg.edge_count(), 0);
        assert_eq!(shadow(&eg, 'b').node_count(), 0);
    }

    #[test]
    fn test_interval_grows_to_union() {
        let det = Detector::uniform(Face::new(0, 0, 0), [10, 10, 10], 0, 1.0).unwrap();
        let face = det.face(0).unwrap().clone();
        let mut builder = EventBuilder::new(&det).unwrap();
        let slice = Arc::new(Slice::default());
        builder.add_slice(slice.clone()).unwrap();
        let a = BlobShape::from_views([(1, 6), (0, 2), (3, 4)]);
        let b = BlobShape::from_views([(3, 9), (1, 5), (3, 4)]);
        let va = builder
            .add_blob(Blob::new(0, Measurement::default(), slice.clone(), face.clone(), a))
            .unwrap();
        let vb = builder
            .add_blob(Blob::new(1, Measurement::default(), slice.clone(), face.clone(), b))
            .unwrap();
        let eg = builder.build();

        let bsg = shadow(&eg, 'c');
        assert_eq!(bsg.edge_count(), 3);
        let u = bsg.edge(vb, va, face.plane(WirePlaneLayer::U)).unwrap();
        assert_eq!((u.beg, u.end), (3, 6));
        let v = bsg.edge(va, vb, face.plane(WirePlaneLayer::V)).unwrap();
        assert_eq!((v.beg, v.end), (1, 2));
    }
}
