use petgraph::graph::DiGraph;
use petgraph::visit::Bfs;

use crate::graph::event::{EventGraph, VertexId};
use crate::graph::node::NodeCode;

/// Rank of a vertex kind in the slice, blob, wire, channel ordering.
fn rank(code: NodeCode) -> Option<u8> {
    match code {
        NodeCode::Slice => Some(0),
        NodeCode::Blob => Some(1),
        NodeCode::Wire => Some(2),
        NodeCode::Channel => Some(3),
        NodeCode::Measure => None,
    }
}

/// Type-directed view of an event graph.
///
/// Edges point slice to blob, blob to wire or channel and wire to channel.
/// Blob-blob and measure edges are left out, so a search started at a blob
/// reaches only its own wires and channels. Vertex handles are shared with
/// the event graph.
pub struct DirectedView<'a> {
    event: &'a EventGraph,
    graph: DiGraph<(), ()>,
}

impl<'a> DirectedView<'a> {
    pub fn new(event: &'a EventGraph) -> Self {
        let mut graph = DiGraph::with_capacity(event.node_count(), event.edge_count());
        for _ in event.vertices() {
            graph.add_node(());
        }
        let inner = event.inner();
        for (a, b) in event.edges() {
            let (ra, rb) = match (rank(inner[a].code()), rank(inner[b].code())) {
                (Some(ra), Some(rb)) => (ra, rb),
                _ => continue,
            };
            if ra < rb {
                graph.add_edge(a, b, ());
            } else if rb < ra {
                graph.add_edge(b, a, ());
            }
        }
        DirectedView { event, graph }
    }

    pub fn successors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.graph.neighbors(v).collect();
        out.sort_unstable();
        out
    }

    /// Vertices of kind `code` reachable from `start`, in ascending handle order.
    pub fn reachable(&self, start: VertexId, code: NodeCode) -> Vec<VertexId> {
        let inner = self.event.inner();
        let mut out = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(v) = bfs.next(&self.graph) {
            if v != start && inner[v].code() == code {
                out.push(v);
            }
        }
        out.sort_unstable();
        out
    }
}
