use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use tracing::debug;

use tpccore::data::geometry::WirePlaneLayer;
use tpccore::data::measurement::Measurement;
use tpccore::graph::components::blob_components;
use tpccore::graph::event::{EventGraph, VertexId};

use crate::error::{ImgError, Result};
use crate::shadow::blob::BlobShadowGraph;
use crate::shadow::coverage::{cover, Coverage};

/// Handle of a geometric cluster in a `ClusterShadowGraph`.
pub type ClusterId = NodeIndex;

/// Blob vertex to the cluster holding it.
pub type BlobClusterMap = FxHashMap<VertexId, ClusterId>;

/// Footprint and charge of one geometric cluster.
#[derive(Clone, Debug, Default)]
pub struct ClusterShadowNode {
    /// Member blobs in ascending handle order.
    pub blobs: Vec<VertexId>,
    pub coverage: [Coverage; 3],
    pub value: Measurement,
}

impl ClusterShadowNode {
    pub fn nblobs(&self) -> usize {
        self.blobs.len()
    }

    pub fn coverage(&self, layer: WirePlaneLayer) -> &Coverage {
        &self.coverage[layer.index()]
    }
}

/// Shadow between two clusters in one layer with the accumulated extent of
/// the underlying blob shadows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterShadowEdge {
    pub layer: WirePlaneLayer,
    pub beg: i32,
    pub end: i32,
}

#[derive(Clone, Debug, Default)]
pub struct ClusterShadowGraph {
    graph: UnGraph<ClusterShadowNode, ClusterShadowEdge>,
    lookup: FxHashMap<(ClusterId, ClusterId, WirePlaneLayer), EdgeIndex>,
}

impl ClusterShadowGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn clusters(&self) -> impl Iterator<Item = ClusterId> {
        self.graph.node_indices()
    }

    pub fn node(&self, c: ClusterId) -> &ClusterShadowNode {
        &self.graph[c]
    }

    /// Edges as (cluster, cluster, edge), lower handle first.
    pub fn edges(&self) -> impl Iterator<Item = (ClusterId, ClusterId, &ClusterShadowEdge)> + '_ {
        self.graph.edge_references().map(|e| {
            let (a, b) = (e.source(), e.target());
            if a <= b { (a, b, e.weight()) } else { (b, a, e.weight()) }
        })
    }

    pub fn edge(&self, a: ClusterId, b: ClusterId, layer: WirePlaneLayer) -> Option<&ClusterShadowEdge> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.lookup.get(&(a, b, layer)).map(|e| &self.graph[*e])
    }

    /// Clusters sharing an edge with `c` in `layer`, ascending.
    pub fn neighbors_in(&self, c: ClusterId, layer: WirePlaneLayer) -> Vec<ClusterId> {
        let mut out: Vec<ClusterId> = self
            .graph
            .edges(c)
            .filter(|e| e.weight().layer == layer)
            .map(|e| if e.source() == c { e.target() } else { e.source() })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Connected components over edges of every layer, ordered by their
    /// smallest cluster.
    pub fn components(&self) -> Vec<Vec<ClusterId>> {
        let mut uf: UnionFind<usize> = UnionFind::new(self.node_count());
        for e in self.graph.edge_references() {
            uf.union(e.source().index(), e.target().index());
        }
        let mut label: FxHashMap<usize, usize> = FxHashMap::default();
        let mut out: Vec<Vec<ClusterId>> = Vec::new();
        for c in self.graph.node_indices() {
            let root = uf.find(c.index());
            let l = *label.entry(root).or_insert_with(|| {
                out.push(Vec::new());
                out.len() - 1
            });
            out[l].push(c);
        }
        out
    }

    fn extend(&mut self, a: ClusterId, b: ClusterId, layer: WirePlaneLayer, beg: i32, end: i32) {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        match self.lookup.get(&(a, b, layer)) {
            Some(e) => {
                let edge = &mut self.graph[*e];
                edge.beg = edge.beg.min(beg);
                edge.end = edge.end.max(end);
            }
            None => {
                let e = self.graph.add_edge(a, b, ClusterShadowEdge { layer, beg, end });
                self.lookup.insert((a, b, layer), e);
            }
        }
    }
}

/// Collapse blob shadows onto geometric clusters.
///
/// # Description
///
/// Clusters are the components of blob-blob edges of the event graph. Each
/// cluster node sums its blobs' charge and records, per view, every
/// non-boundary strip crossed with the blob's slice time window. Each blob
/// shadow edge between two different clusters adds or extends the single
/// cluster edge of its layer.
///
/// # Arguments
///
/// * `eg` - The event graph.
/// * `bsg` - Its blob shadow graph.
///
/// # Returns
///
/// * The cluster shadow graph and the blob to cluster map.
///
pub fn shadow(eg: &EventGraph, bsg: &BlobShadowGraph) -> Result<(ClusterShadowGraph, BlobClusterMap)> {
    let mut csg = ClusterShadowGraph::default();
    let mut b2c = BlobClusterMap::default();

    for members in blob_components(eg) {
        let mut node = ClusterShadowNode::default();
        for bv in &members {
            let blob = eg.blob(*bv)?;
            node.value += blob.value;
            let time = (blob.slice.start, blob.slice.end());
            for (view, strip) in blob.shape.views() {
                cover(&mut node.coverage[view.index()], time, strip.bounds, *bv);
            }
        }
        node.blobs = members;
        let c = csg.graph.add_node(node);
        for bv in &csg.graph[c].blobs {
            b2c.insert(*bv, c);
        }
    }

    for (a, b, edge) in bsg.edges() {
        let (ca, cb) = match (b2c.get(&a), b2c.get(&b)) {
            (Some(ca), Some(cb)) => (*ca, *cb),
            _ => {
                return Err(ImgError::inconsistency(format!(
                    "blob shadow edge {:?}-{:?} references a blob outside the event graph",
                    a, b
                )))
            }
        };
        if ca == cb {
            continue;
        }
        csg.extend(ca, cb, edge.plane.layer, edge.beg, edge.end);
    }

    debug!(
        "cluster shadow: {} clusters, {} edges from {} blob shadow edges",
        csg.node_count(),
        csg.edge_count(),
        bsg.edge_count()
    );
    Ok((csg, b2c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::blob;
    use std::sync::Arc;
    use tpccore::data::blob::{Blob, BlobShape};
    use tpccore::data::geometry::{Detector, Face};
    use tpccore::data::slice::Slice;
    use tpccore::graph::builder::EventBuilder;

    #[test]
    fn test_one_edge_per_cluster_pair_and_layer() {
        let det = Detector::uniform(Face::new(0, 0, 0), [12, 12, 12], 0, 1.0).unwrap();
        let face = det.face(0).unwrap().clone();
        let mut builder = EventBuilder::new(&det).unwrap();
        let slice = Arc::new(Slice::new(0, 0, 0.0, 4.0, Default::default()));
        builder.add_slice(slice.clone()).unwrap();

        // cluster A = {0, 1}, cluster B = {2, 3}; every A blob shadows every B blob in U
        let shapes = [
            BlobShape::from_views([(0, 4), (0, 2), (0, 2)]),
            BlobShape::from_views([(2, 6), (2, 4), (2, 4)]),
            BlobShape::from_views([(3, 5), (6, 8), (6, 8)]),
            BlobShape::from_views([(1, 3), (9, 11), (9, 11)]),
        ];
        for (i, shape) in shapes.into_iter().enumerate() {
            let blob = Blob::new(i as i32, Measurement::new(1.0, 1.0), slice.clone(), face.clone(), shape);
            builder.add_blob(blob).unwrap();
        }
        builder.connect_blobs(0, 1).unwrap();
        builder.connect_blobs(2, 3).unwrap();
        let eg = builder.build();

        let bsg = blob::shadow(&eg, 'w');
        let (csg, b2c) = shadow(&eg, &bsg).unwrap();
        assert_eq!(csg.node_count(), 2);

        let mut seen = std::collections::BTreeSet::new();
        for (a, b, e) in csg.edges() {
            assert_ne!(a, b);
            assert!(seen.insert((a, b, e.layer)));
        }
        let ca = b2c[&eg.vertices_of(tpccore::graph::node::NodeCode::Blob)[0]];
        let cb = csg.clusters().find(|c| *c != ca).unwrap();
        let u = csg.edge(ca, cb, WirePlaneLayer::U).unwrap();
        assert_eq!((u.beg, u.end), (1, 5));
        assert_eq!(csg.node(ca).nblobs(), 2);
        assert!((csg.node(ca).value.value - 2.0).abs() < 1e-12);
        assert_eq!(csg.components().len(), 1);
    }
}
