use rustc_hash::FxHashSet;
use tracing::debug;

use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::{Node, NodeCode};

use crate::error::Result;

/// Remove blobs with charge below `threshold` and the measures left without
/// any blob. Slices, wires, channels and their edges are kept.
///
/// # Examples
///
/// ```
/// use tpccore::graph::event::EventGraph;
/// use tpcimg::solve::prune::prune_blobs;
///
/// let pruned = prune_blobs(&EventGraph::new(), 10.0).unwrap();
/// assert_eq!(pruned.node_count(), 0);
/// ```
pub fn prune_blobs(eg: &EventGraph, threshold: f64) -> Result<EventGraph> {
    let mut dropped: FxHashSet<VertexId> = FxHashSet::default();
    for bv in eg.vertices_of(NodeCode::Blob) {
        if eg.blob(bv)?.value.value < threshold {
            dropped.insert(bv);
        }
    }
    for mv in eg.vertices_of(NodeCode::Measure) {
        let alive = eg
            .neighbors_of(mv, NodeCode::Blob)
            .iter()
            .any(|bv| !dropped.contains(bv));
        if !alive {
            dropped.insert(mv);
        }
    }

    let (out, _) = eg.filtered(|v, _: &Node| !dropped.contains(&v), |_, _| true);
    debug!(
        "prune blobs below {}: removed {} vertices, {}",
        threshold,
        dropped.len(),
        out.summary()
    );
    Ok(out)
}
