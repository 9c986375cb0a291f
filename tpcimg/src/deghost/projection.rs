use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use sprs::{CsMat, TriMat};
use tracing::trace;

use tpccore::data::geometry::WirePlaneLayer;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::NodeCode;

use crate::error::{ImgError, Result};

/// Cell of a projection, (channel, slice index).
pub type Cell = (usize, usize);

/// Charge of one cluster in one layer over (channel, slice index) cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection2D {
    /// Smallest and largest channel, then smallest and largest slice index.
    pub bound: Option<(usize, usize, usize, usize)>,
    pub charge: CsMat<f64>,
    pub dead: FxHashSet<Cell>,
}

impl Projection2D {
    /// An empty projection of the given shape.
    pub fn empty(nchan: usize, nslice: usize) -> Self {
        Projection2D {
            bound: None,
            charge: CsMat::zero((nchan, nslice)),
            dead: FxHashSet::default(),
        }
    }

    /// Build from cell values; cells listed in `dead` are dead.
    pub fn from_cells(nchan: usize, nslice: usize, cells: &BTreeMap<Cell, f64>, dead: FxHashSet<Cell>) -> Self {
        let mut tri = TriMat::with_capacity((nchan, nslice), cells.len());
        let mut bound: Option<(usize, usize, usize, usize)> = None;
        for (&(row, col), &q) in cells {
            tri.add_triplet(row, col, q);
            bound = Some(match bound {
                None => (row, row, col, col),
                Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
            });
        }
        Projection2D { bound, charge: tri.to_csr(), dead }
    }

    pub fn is_dead(&self, cell: Cell) -> bool {
        self.dead.contains(&cell)
    }

    /// Cells holding a live charge, within (0, `cut`).
    pub fn live_cells(&self, cut: f64) -> impl Iterator<Item = (Cell, f64)> + '_ {
        self.charge
            .iter()
            .filter(move |(q, cell)| **q > 0.0 && **q < cut && !self.dead.contains(cell))
            .map(|(q, cell)| (cell, *q))
    }

    /// Summed live charge.
    pub fn total(&self, cut: f64) -> f64 {
        self.live_cells(cut).map(|(_, q)| q).sum()
    }

    pub fn nnz(&self) -> usize {
        self.charge.nnz()
    }
}

/// Per layer projections of one geometric cluster and its summary numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterProjection {
    pub layers: BTreeMap<WirePlaneLayer, Projection2D>,
    /// Mean over layers of the summed live charge.
    pub estimated_total_charge: f64,
    /// Smallest summed live charge of any layer.
    pub estimated_minimum_charge: f64,
    pub number_blobs: usize,
    pub number_slices: usize,
}

impl ClusterProjection {
    pub fn layer(&self, layer: WirePlaneLayer) -> Option<&Projection2D> {
        self.layers.get(&layer)
    }
}

/// Project the blobs of a cluster onto (channel, slice index) per layer.
///
/// # Description
///
/// Each blob reaches its channels through its wires. A cell takes the
/// channel activity of the blob's slice; channels without activity leave no
/// cell, channels whose uncertainty exceeds `uncertainty_cut` store
/// `dead_default` and are marked dead.
///
/// # Arguments
///
/// * `eg` - The event graph.
/// * `blobs` - Blob vertices of the cluster.
/// * `nchan` - Number of rows, channel identities must be below it.
/// * `nslice` - Number of columns, slice indices must be below it.
/// * `uncertainty_cut` - Uncertainty above which a channel is dead.
/// * `dead_default` - Charge stored in dead cells.
///
pub fn project(
    eg: &EventGraph,
    blobs: &[VertexId],
    nchan: usize,
    nslice: usize,
    uncertainty_cut: f64,
    dead_default: f64,
) -> Result<ClusterProjection> {
    let mut cells: BTreeMap<WirePlaneLayer, BTreeMap<Cell, f64>> = BTreeMap::new();
    let mut dead: BTreeMap<WirePlaneLayer, FxHashSet<Cell>> = BTreeMap::new();
    let mut slices = BTreeSet::new();

    for bv in blobs {
        let sv = eg.slice_of(*bv)?;
        let slice = eg.slice(sv)?;
        slices.insert(slice.ident);
        let col = slice.index();
        if col < 0 || col as usize >= nslice {
            return Err(ImgError::inconsistency(format!(
                "slice {} index {} outside projection of {} slices",
                slice.ident, col, nslice
            )));
        }
        let col = col as usize;

        for wv in eg.neighbors_of(*bv, NodeCode::Wire) {
            for cv in eg.neighbors_of(wv, NodeCode::Channel) {
                let channel = eg.node(cv)?.as_channel()?;
                if channel.ident < 0 || channel.ident as usize >= nchan {
                    return Err(ImgError::inconsistency(format!(
                        "channel {} outside projection of {} channels",
                        channel.ident, nchan
                    )));
                }
                let Some(activity) = slice.charge(channel.ident) else {
                    continue;
                };
                let cell = (channel.ident as usize, col);
                let layer = channel.plane.layer;
                if activity.uncertainty > uncertainty_cut {
                    cells.entry(layer).or_default().insert(cell, dead_default);
                    dead.entry(layer).or_default().insert(cell);
                } else {
                    cells.entry(layer).or_default().insert(cell, activity.value);
                }
            }
        }
    }

    let mut layers = BTreeMap::new();
    for (layer, lcells) in cells {
        let ldead = dead.remove(&layer).unwrap_or_default();
        layers.insert(layer, Projection2D::from_cells(nchan, nslice, &lcells, ldead));
    }

    let totals: Vec<f64> = layers.values().map(|p| p.total(uncertainty_cut)).collect();
    let (estimated_total_charge, estimated_minimum_charge) = if totals.is_empty() {
        (0.0, 0.0)
    } else {
        (
            totals.iter().sum::<f64>() / totals.len() as f64,
            totals.iter().copied().fold(f64::INFINITY, f64::min),
        )
    };
    trace!(
        "projection: {} blobs, {} slices, {} layers, total={:.1} min={:.1}",
        blobs.len(),
        slices.len(),
        layers.len(),
        estimated_total_charge,
        estimated_minimum_charge
    );

    Ok(ClusterProjection {
        layers,
        estimated_total_charge,
        estimated_minimum_charge,
        number_blobs: blobs.len(),
        number_slices: slices.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;
    use tpccore::data::blob::{Blob, BlobShape};
    use tpccore::data::geometry::{Detector, Face};
    use tpccore::data::measurement::Measurement;
    use tpccore::data::slice::Slice;
    use tpccore::graph::builder::EventBuilder;

    #[test]
    fn test_projection_cells_and_dead_channels() {
        let det = Detector::uniform(Face::new(0, 0, 0), [4, 4, 4], 0, 1.0).unwrap();
        let face = det.face(0).unwrap().clone();
        let mut activity = FxHashMap::default();
        activity.insert(1, Measurement::new(10.0, 1.0));
        activity.insert(2, Measurement::new(20.0, 1e12));
        activity.insert(4, Measurement::new(30.0, 1.0));
        let slice = Arc::new(Slice::new(0, 0, 6.0, 2.0, activity));
        let mut builder = EventBuilder::new(&det).unwrap();
        builder.add_slice(slice.clone()).unwrap();
        let shape = BlobShape::from_views([(1, 3), (0, 2), (0, 1)]);
        let bv = builder
            .add_blob(Blob::new(0, Measurement::default(), slice, face, shape))
            .unwrap();
        let eg = builder.build();

        let proj = project(&eg, &[bv], 16, 8, 1e11, -1e12).unwrap();
        assert_eq!(proj.number_blobs, 1);
        assert_eq!(proj.number_slices, 1);

        let u = proj.layer(WirePlaneLayer::U).unwrap();
        assert_eq!(u.nnz(), 2);
        assert_eq!(u.charge.get(1, 3), Some(&10.0));
        assert!(u.is_dead((2, 3)));
        assert!((u.total(1e11) - 10.0).abs() < 1e-12);
        assert_eq!(u.bound, Some((1, 2, 3, 3)));

        let v = proj.layer(WirePlaneLayer::V).unwrap();
        assert_eq!(v.charge.get(4, 3), Some(&30.0));
        // W channel 8 has no activity
        assert!(proj.layer(WirePlaneLayer::W).is_none());
        assert!((proj.estimated_total_charge - 20.0).abs() < 1e-12);
        assert!((proj.estimated_minimum_charge - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_cell_is_error() {
        let det = Detector::uniform(Face::new(0, 0, 0), [4, 4, 4], 0, 1.0).unwrap();
        let face = det.face(0).unwrap().clone();
        let slice = Arc::new(Slice::new(0, 0, 100.0, 2.0, FxHashMap::default()));
        let mut builder = EventBuilder::new(&det).unwrap();
        builder.add_slice(slice.clone()).unwrap();
        let bv = builder
            .add_blob(Blob::new(0, Measurement::default(), slice, face, BlobShape::from_views([(0, 1), (0, 1), (0, 1)])))
            .unwrap();
        let eg = builder.build();
        assert!(matches!(project(&eg, &[bv], 16, 8, 1e11, -1e12), Err(ImgError::DataInconsistency(_))));
    }
}
