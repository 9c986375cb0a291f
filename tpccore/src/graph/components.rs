use petgraph::unionfind::UnionFind;
use rustc_hash::FxHashMap;

use crate::graph::event::{EventGraph, VertexId};
use crate::graph::node::{Node, NodeCode};

/// Connected components of the subgraph induced by the accepted vertices and
/// edges.
///
/// Components are ordered by their smallest vertex handle and each holds its
/// members in ascending handle order, so labels are stable across runs.
pub fn connected_components<FV, FE>(eg: &EventGraph, keep_vertex: FV, keep_edge: FE) -> Vec<Vec<VertexId>>
where
    FV: Fn(&Node) -> bool,
    FE: Fn(&Node, &Node) -> bool,
{
    let inner = eg.inner();
    let mut uf: UnionFind<usize> = UnionFind::new(eg.node_count());
    for (a, b) in eg.edges() {
        let (na, nb) = (&inner[a], &inner[b]);
        if keep_vertex(na) && keep_vertex(nb) && keep_edge(na, nb) {
            uf.union(a.index(), b.index());
        }
    }

    let mut index: FxHashMap<usize, usize> = FxHashMap::default();
    let mut out: Vec<Vec<VertexId>> = Vec::new();
    for v in eg.vertices() {
        if !keep_vertex(&inner[v]) {
            continue;
        }
        let root = uf.find(v.index());
        let label = *index.entry(root).or_insert_with(|| {
            out.push(Vec::new());
            out.len() - 1
        });
        out[label].push(v);
    }
    out
}

/// Geometric clusters: components of blobs joined by blob-blob edges.
pub fn blob_components(eg: &EventGraph) -> Vec<Vec<VertexId>> {
    let is_blob = |n: &Node| n.code() == NodeCode::Blob;
    connected_components(eg, is_blob, |_, _| true)
}

/// Map each member vertex to the position of its component.
pub fn labels(components: &[Vec<VertexId>]) -> FxHashMap<VertexId, usize> {
    let mut out = FxHashMap::default();
    for (label, members) in components.iter().enumerate() {
        for v in members {
            out.insert(*v, label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::blob::{Blob, BlobShape};
    use crate::data::geometry::Face;
    use crate::data::measurement::Measurement;
    use crate::data::slice::Slice;
    use std::sync::Arc;

    #[test]
    fn test_blob_components_ignore_slices() {
        let slice = Arc::new(Slice::default());
        let face = Arc::new(Face::new(0, 0, 0));
        let mut g = EventGraph::new();
        let s = g.add_node(Node::Slice(slice.clone()));
        let blobs: Vec<VertexId> = (0..4)
            .map(|i| {
                g.add_node(Blob::new(i, Measurement::default(), slice.clone(), face.clone(), BlobShape::default()))
            })
            .collect();
        for b in &blobs {
            g.add_edge(s, *b).unwrap();
        }
        g.add_edge(blobs[0], blobs[2]).unwrap();
        g.add_edge(blobs[2], blobs[3]).unwrap();

        let comps = blob_components(&g);
        assert_eq!(comps, vec![vec![blobs[0], blobs[2], blobs[3]], vec![blobs[1]]]);
        let lab = labels(&comps);
        assert_eq!(lab[&blobs[3]], 0);
        assert_eq!(lab[&blobs[1]], 1);
        assert!(!lab.contains_key(&s));
    }
}
