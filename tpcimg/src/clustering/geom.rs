use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::debug;

use tpccore::graph::components::{blob_components, labels};
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::NodeCode;

use crate::clustering::policy::GeomClusteringPolicy;
use crate::error::Result;

/// Blobs of one slice.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobSet {
    pub slice: VertexId,
    pub blobs: Vec<VertexId>,
}

/// Group blobs by their slice, ordered by slice start time.
pub fn blob_sets(eg: &EventGraph) -> Result<Vec<BlobSet>> {
    let mut by_slice: FxHashMap<VertexId, Vec<VertexId>> = FxHashMap::default();
    for bv in eg.vertices_of(NodeCode::Blob) {
        let sv = eg.slice_of(bv)?;
        by_slice.entry(sv).or_default().push(bv);
    }
    let mut sets = Vec::with_capacity(by_slice.len());
    for (slice, blobs) in by_slice {
        let s = eg.slice(slice)?;
        sets.push((s.start, s.ident, BlobSet { slice, blobs }));
    }
    Ok(sets
        .into_iter()
        .sorted_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, set)| set)
        .collect())
}

/// Relative separation of two slices in units of the earlier slice's span.
fn rel_diff(eg: &EventGraph, a: VertexId, b: VertexId) -> Result<i32> {
    let (sa, sb) = (eg.slice(a)?, eg.slice(b)?);
    if sa.span <= 0.0 {
        return Ok(i32::MAX);
    }
    Ok(((sb.start - sa.start) / sa.span).round() as i32)
}

fn connect_where<P, F>(eg: &mut EventGraph, sets: &[BlobSet], policy: &P, allow: F) -> Result<usize>
where
    P: GeomClusteringPolicy + ?Sized,
    F: Fn(VertexId, VertexId) -> bool,
{
    let mut pairs = Vec::new();
    for (i, first) in sets.iter().enumerate() {
        for (j, second) in sets.iter().enumerate().skip(i + 1) {
            let rel = rel_diff(eg, first.slice, second.slice)?;
            if rel > policy.max_rel_diff() {
                break;
            }
            if policy.adjacent_only() && j != i + 1 {
                continue;
            }
            let Some(tolerance) = policy.tolerance(rel) else {
                continue;
            };
            for (b1, b2) in first.blobs.iter().cartesian_product(second.blobs.iter()) {
                if !allow(*b1, *b2) {
                    continue;
                }
                let (x, y) = (eg.blob(*b1)?, eg.blob(*b2)?);
                if x.face.ident != y.face.ident {
                    continue;
                }
                if x.shape.overlaps(&y.shape, tolerance) {
                    pairs.push((*b1, *b2));
                }
            }
        }
    }

    let before = eg.edge_count();
    for (a, b) in pairs {
        eg.add_edge(a, b)?;
    }
    Ok(eg.edge_count() - before)
}

/// Add blob-blob edges between blobs of nearby slices whose strips overlap
/// in every view under the policy's tolerance.
///
/// # Arguments
///
/// * `eg` - The event graph, edited in place.
/// * `sets` - Blobs per slice, ordered by slice start.
/// * `policy` - The clustering policy.
///
/// # Returns
///
/// * The number of edges added.
///
pub fn connect<P>(eg: &mut EventGraph, sets: &[BlobSet], policy: &P) -> Result<usize>
where
    P: GeomClusteringPolicy + ?Sized,
{
    let added = connect_where(eg, sets, policy, |_, _| true)?;
    debug!("geom clustering: {} blob-blob edges added over {} slices", added, sets.len());
    Ok(added)
}

/// As `connect`, joining only blobs with the same group label.
pub fn grouped_connect<P>(
    eg: &mut EventGraph,
    sets: &[BlobSet],
    policy: &P,
    groups: &FxHashMap<VertexId, usize>,
) -> Result<usize>
where
    P: GeomClusteringPolicy + ?Sized,
{
    connect_where(eg, sets, policy, |a, b| match (groups.get(&a), groups.get(&b)) {
        (Some(ga), Some(gb)) => ga == gb,
        _ => false,
    })
}

/// Re-cluster locally: drop all blob-blob edges and connect again with
/// `policy`, only within the geometric clusters the graph had before.
pub fn regroup<P>(eg: &EventGraph, policy: &P) -> Result<EventGraph>
where
    P: GeomClusteringPolicy + ?Sized,
{
    let old = labels(&blob_components(eg));
    let (mut out, map) = eg.filtered(
        |_, _| true,
        |a, b| !(a.code() == NodeCode::Blob && b.code() == NodeCode::Blob),
    );
    let groups: FxHashMap<VertexId, usize> = old
        .into_iter()
        .filter_map(|(v, label)| map.get(&v).map(|nv| (*nv, label)))
        .collect();
    let sets = blob_sets(&out)?;
    let added = grouped_connect(&mut out, &sets, policy, &groups)?;
    debug!(
        "geom regroup: {} clusters before, {} blob-blob edges after",
        groups.values().unique().count(),
        added
    );
    Ok(out)
}
