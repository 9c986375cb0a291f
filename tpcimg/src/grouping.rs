use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;
use rustc_hash::FxHashMap;
use tracing::debug;

use tpccore::data::geometry::WirePlaneId;
use tpccore::data::measure::Measure;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::NodeCode;

use crate::error::Result;

/// Channels a blob reads out through its wires, per plane.
fn blob_channels(eg: &EventGraph, blob: VertexId) -> Result<BTreeMap<WirePlaneId, Vec<VertexId>>> {
    let mut out: BTreeMap<WirePlaneId, Vec<VertexId>> = BTreeMap::new();
    for wv in eg.neighbors_of(blob, NodeCode::Wire) {
        for cv in eg.neighbors_of(wv, NodeCode::Channel) {
            let plane = eg.node(cv)?.as_channel()?.plane;
            out.entry(plane).or_default().push(cv);
        }
    }
    for chans in out.values_mut() {
        chans.sort_unstable();
        chans.dedup();
    }
    Ok(out)
}

/// Rebuild the measures of an event graph.
///
/// # Description
///
/// Existing measures are dropped. Then, per slice and per plane, blobs and
/// the channels they read out form a bipartite graph; each of its connected
/// components becomes one measure holding the slice activity summed over the
/// component's channels, linked to the component's blobs and channels.
///
pub fn group_measures(eg: &EventGraph) -> Result<EventGraph> {
    let (mut out, _) = eg.filtered(|_, node| node.code() != NodeCode::Measure, |_, _| true);
    let mut ident = 0;

    for sv in out.vertices_of(NodeCode::Slice) {
        let slice = out.slice(sv)?.clone();
        let blobs = out.neighbors_of(sv, NodeCode::Blob);

        let mut per_plane: BTreeMap<WirePlaneId, Vec<(VertexId, Vec<VertexId>)>> = BTreeMap::new();
        for bv in &blobs {
            for (plane, chans) in blob_channels(&out, *bv)? {
                per_plane.entry(plane).or_default().push((*bv, chans));
            }
        }

        for (plane, members) in per_plane {
            // local indices: blobs first, then channels in order of appearance
            let mut local: FxHashMap<VertexId, usize> = FxHashMap::default();
            let mut order: Vec<VertexId> = Vec::new();
            for (bv, chans) in &members {
                for v in std::iter::once(bv).chain(chans.iter()) {
                    local.entry(*v).or_insert_with(|| {
                        order.push(*v);
                        order.len() - 1
                    });
                }
            }
            let mut uf: UnionFind<usize> = UnionFind::new(order.len());
            for (bv, chans) in &members {
                for cv in chans {
                    uf.union(local[bv], local[cv]);
                }
            }

            let mut groups: BTreeMap<usize, (Vec<VertexId>, Vec<VertexId>)> = BTreeMap::new();
            for (bv, chans) in &members {
                let root = uf.find(local[bv]);
                let group = groups.entry(root).or_default();
                group.0.push(*bv);
                group.1.extend(chans.iter().copied());
            }

            for (_, (gblobs, mut gchans)) in groups {
                gchans.sort_unstable();
                gchans.dedup();
                let mut chidents = Vec::with_capacity(gchans.len());
                for cv in &gchans {
                    chidents.push(out.node(*cv)?.as_channel()?.ident);
                }
                let measure = Measure::summed(ident, plane, chidents, &slice);
                ident += 1;
                let mv = out.add_node(measure);
                for bv in gblobs {
                    out.add_edge(mv, bv)?;
                }
                for cv in gchans {
                    out.add_edge(mv, cv)?;
                }
            }
        }
    }

    debug!("measure grouping: {}", out.summary());
    Ok(out)
}
