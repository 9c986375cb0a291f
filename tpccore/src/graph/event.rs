use std::fmt;
use std::sync::Arc;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::data::blob::Blob;
use crate::data::measure::Measure;
use crate::data::slice::Slice;
use crate::error::{CoreError, Result};
use crate::graph::node::{Node, NodeCode};

/// Stable handle of a vertex within one `EventGraph`.
pub type VertexId = NodeIndex;

/// Old to new vertex handles produced by a filtering copy.
pub type VertexMap = FxHashMap<VertexId, VertexId>;

/// The heterogeneous event graph of channels, wires, blobs, slices and measures.
///
/// # Description
///
/// Vertices live in an arena and are addressed by `VertexId`. Algorithms
/// never remove vertices from a live graph; they build a filtered copy and
/// receive the old to new handle map alongside it. Edges carry no payload and
/// are unique per vertex pair.
///
#[derive(Clone, Debug, Default)]
pub struct EventGraph {
    graph: UnGraph<Node, ()>,
}

impl EventGraph {
    pub fn new() -> Self {
        EventGraph { graph: UnGraph::default() }
    }

    pub fn add_node(&mut self, node: impl Into<Node>) -> VertexId {
        self.graph.add_node(node.into())
    }

    /// Add an edge unless one already joins the two vertices.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId) -> Result<()> {
        self.check(a)?;
        self.check(b)?;
        self.graph.update_edge(a, b, ());
        Ok(())
    }

    pub fn contains_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.graph.find_edge(a, b).is_some()
    }

    fn check(&self, v: VertexId) -> Result<()> {
        if v.index() < self.graph.node_count() {
            Ok(())
        } else {
            Err(CoreError::MissingVertex(v.index()))
        }
    }

    pub fn node(&self, v: VertexId) -> Result<&Node> {
        self.graph.node_weight(v).ok_or(CoreError::MissingVertex(v.index()))
    }

    /// Replace the payload of a vertex, keeping its edges.
    pub fn set_node(&mut self, v: VertexId, node: impl Into<Node>) -> Result<()> {
        let slot = self.graph.node_weight_mut(v).ok_or(CoreError::MissingVertex(v.index()))?;
        *slot = node.into();
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.node_indices()
    }

    /// Edge end points, lower handle first.
    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        self.graph.edge_references().map(|e| {
            let (a, b) = (e.source(), e.target());
            if a <= b { (a, b) } else { (b, a) }
        })
    }

    /// Neighbors in ascending handle order.
    pub fn neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.graph.neighbors(v).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn neighbors_of(&self, v: VertexId, code: NodeCode) -> Vec<VertexId> {
        self.neighbors(v)
            .into_iter()
            .filter(|n| self.graph[*n].code() == code)
            .collect()
    }

    pub fn vertices_of(&self, code: NodeCode) -> Vec<VertexId> {
        self.graph
            .node_indices()
            .filter(|v| self.graph[*v].code() == code)
            .collect()
    }

    pub fn blob(&self, v: VertexId) -> Result<&Arc<Blob>> {
        self.node(v)?.as_blob()
    }

    pub fn slice(&self, v: VertexId) -> Result<&Arc<Slice>> {
        self.node(v)?.as_slice()
    }

    pub fn measure(&self, v: VertexId) -> Result<&Arc<Measure>> {
        self.node(v)?.as_measure()
    }

    /// The single slice vertex adjacent to a blob vertex.
    pub fn slice_of(&self, blob: VertexId) -> Result<VertexId> {
        let b = self.blob(blob)?;
        let slices = self.neighbors_of(blob, NodeCode::Slice);
        match slices.as_slice() {
            [s] => Ok(*s),
            _ => Err(CoreError::BlobSlice { blob: b.ident, count: slices.len() }),
        }
    }

    /// Copy the graph keeping the vertices and edges the predicates accept.
    /// An edge is kept only if both its end points are kept.
    ///
    /// # Arguments
    ///
    /// * `keep_vertex` - Called with each vertex handle and payload.
    /// * `keep_edge` - Called with the payloads of both end points.
    ///
    /// # Returns
    ///
    /// * The new graph and the map from kept old handles to new handles.
    ///
    pub fn filtered<FV, FE>(&self, keep_vertex: FV, keep_edge: FE) -> (EventGraph, VertexMap)
    where
        FV: Fn(VertexId, &Node) -> bool,
        FE: Fn(&Node, &Node) -> bool,
    {
        let mut out = EventGraph::new();
        let mut map = VertexMap::default();
        for v in self.graph.node_indices() {
            let node = &self.graph[v];
            if keep_vertex(v, node) {
                let nv = out.graph.add_node(node.clone());
                map.insert(v, nv);
            }
        }
        for e in self.graph.edge_references() {
            let (a, b) = (e.source(), e.target());
            if let (Some(na), Some(nb)) = (map.get(&a), map.get(&b)) {
                if keep_edge(&self.graph[a], &self.graph[b]) {
                    out.graph.update_edge(*na, *nb, ());
                }
            }
        }
        (out, map)
    }

    /// Copy without any edge joining two vertices of the given codes.
    pub fn without_edges(&self, a: NodeCode, b: NodeCode) -> EventGraph {
        self.filtered(
            |_, _| true,
            |x, y| {
                let (cx, cy) = (x.code(), y.code());
                !((cx == a && cy == b) || (cx == b && cy == a))
            },
        )
        .0
    }

    pub fn inner(&self) -> &UnGraph<Node, ()> {
        &self.graph
    }

    pub fn summary(&self) -> GraphSummary {
        let mut summary = GraphSummary {
            vertices: self.node_count(),
            edges: self.edge_count(),
            ..GraphSummary::default()
        };
        for node in self.graph.node_weights() {
            match node {
                Node::Channel(_) => summary.channels += 1,
                Node::Wire(_) => summary.wires += 1,
                Node::Slice(_) => summary.slices += 1,
                Node::Measure(_) => summary.measures += 1,
                Node::Blob(b) => {
                    summary.blobs += 1;
                    summary.blob_charge += b.value.value;
                }
            }
        }
        for (a, b) in self.edges() {
            if self.graph[a].code() == NodeCode::Blob && self.graph[b].code() == NodeCode::Blob {
                summary.blob_edges += 1;
            }
        }
        summary
    }
}

/// Counts used in per-stage log lines.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphSummary {
    pub vertices: usize,
    pub edges: usize,
    pub channels: usize,
    pub wires: usize,
    pub blobs: usize,
    pub slices: usize,
    pub measures: usize,
    pub blob_edges: usize,
    pub blob_charge: f64,
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} edges={} c={} w={} b={} s={} m={} bb={} charge={:.1}",
            self.vertices,
            self.edges,
            self.channels,
            self.wires,
            self.blobs,
            self.slices,
            self.measures,
            self.blob_edges,
            self.blob_charge
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::blob::BlobShape;
    use crate::data::geometry::Face;
    use crate::data::measurement::Measurement;
    use rustc_hash::FxHashMap;

    fn blob(ident: i32, slice: &Arc<Slice>) -> Blob {
        Blob::new(
            ident,
            Measurement::new(1.0, 0.0),
            slice.clone(),
            Arc::new(Face::new(0, 0, 0)),
            BlobShape::from_views([(0, 1), (0, 1), (0, 1)]),
        )
    }

    #[test]
    fn test_edges_are_unique() {
        let slice = Arc::new(Slice::new(0, 0, 0.0, 1.0, FxHashMap::default()));
        let mut g = EventGraph::new();
        let s = g.add_node(Node::Slice(slice.clone()));
        let b = g.add_node(blob(1, &slice));
        g.add_edge(s, b).unwrap();
        g.add_edge(b, s).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.slice_of(b).unwrap(), s);
        assert!(g.add_edge(s, VertexId::new(17)).is_err());
    }

    #[test]
    fn test_blob_without_slice_is_error() {
        let slice = Arc::new(Slice::new(0, 0, 0.0, 1.0, FxHashMap::default()));
        let mut g = EventGraph::new();
        let b = g.add_node(blob(1, &slice));
        assert!(matches!(g.slice_of(b), Err(CoreError::BlobSlice { blob: 1, count: 0 })));
    }

    #[test]
    fn test_filtered_maps_handles() {
        let slice = Arc::new(Slice::new(0, 0, 0.0, 1.0, FxHashMap::default()));
        let mut g = EventGraph::new();
        let s = g.add_node(Node::Slice(slice.clone()));
        let b1 = g.add_node(blob(1, &slice));
        let b2 = g.add_node(blob(2, &slice));
        g.add_edge(s, b1).unwrap();
        g.add_edge(s, b2).unwrap();
        g.add_edge(b1, b2).unwrap();

        let (f, map) = g.filtered(|v, _| v != b1, |_, _| true);
        assert_eq!(f.node_count(), 2);
        assert_eq!(f.edge_count(), 1);
        assert!(!map.contains_key(&b1));
        assert_eq!(f.blob(map[&b2]).unwrap().ident, 2);

        let stripped = g.without_edges(NodeCode::Blob, NodeCode::Blob);
        assert_eq!(stripped.edge_count(), 2);
        assert_eq!(g.summary().blob_edges, 1);
        assert_eq!(stripped.summary().blob_edges, 0);
    }
}
