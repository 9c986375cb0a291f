use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use tpccore::data::geometry::WirePlaneLayer;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::Node;

use crate::config::{DeghostConfig, Validate};
use crate::deghost::judge::{judge_coverage, judge_coverage_alt, CoverageRelation};
use crate::deghost::projection::{project, ClusterProjection, Projection2D};
use crate::error::Result;
use crate::shadow::blob;
use crate::shadow::cluster::{self, ClusterId, ClusterShadowGraph};

/// Outcome of the same-layer comparison of a cluster with its shadow peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LayerStatus {
    /// No projection in this layer.
    Absent,
    /// Not covered by any peer and equal to none.
    Unique,
    /// Equal to a peer, kept as one group with it.
    Equal,
    /// Covered by a peer.
    Covered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VerdictReason {
    /// Covered by a stronger neighbor in every other layer.
    CrossLayer,
    /// Covered in some layer and unique in none.
    Covered,
    /// Unique in at least as many layers as there are cut rows.
    UniqueLayers,
    /// Decided by the charge per blob cut.
    ChargeCut,
}

/// Decision and diagnostics for one geometric cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterVerdict {
    pub cluster: usize,
    pub blobs: Vec<i32>,
    pub number_slices: usize,
    pub estimated_total_charge: f64,
    pub estimated_minimum_charge: f64,
    pub layers: [LayerStatus; 3],
    pub unique_layers: usize,
    pub accepted: bool,
    pub reason: VerdictReason,
}

/// Removes ghost clusters by comparing their wire-time projections with
/// those of the clusters they shadow.
#[derive(Clone, Debug)]
pub struct ProjectionDeghosting {
    cfg: DeghostConfig,
}

impl ProjectionDeghosting {
    pub fn new(cfg: &DeghostConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(ProjectionDeghosting { cfg: cfg.clone() })
    }

    pub fn config(&self) -> &DeghostConfig {
        &self.cfg
    }

    /// Judge every geometric cluster and return the graph without the blobs
    /// of rejected clusters, or the input graph when `dryrun` is set.
    pub fn run(&self, eg: &EventGraph) -> Result<(EventGraph, Vec<ClusterVerdict>)> {
        debug!("deghosting in: {}", eg.summary());
        let bsg = blob::shadow(eg, self.cfg.shadow_type);
        let (csg, _) = cluster::shadow(eg, &bsg)?;

        let clusters: Vec<ClusterId> = csg.clusters().collect();
        let projections: Vec<ClusterProjection> = clusters
            .par_iter()
            .map(|c| {
                project(
                    eg,
                    &csg.node(*c).blobs,
                    self.cfg.nchan,
                    self.cfg.nslice,
                    self.cfg.uncertainty_cut,
                    self.cfg.dead_default_charge,
                )
            })
            .collect::<Result<Vec<ClusterProjection>>>()?;

        let status = self.layer_status(&csg, &projections);
        let removed = self.cross_layer_removal(&csg, &projections);
        let verdicts: Vec<ClusterVerdict> = clusters
            .iter()
            .map(|c| self.verdict(eg, &csg, *c, &projections[c.index()], status[c.index()], removed.contains(c)))
            .collect::<Result<Vec<ClusterVerdict>>>()?;

        let rejected: FxHashSet<VertexId> = verdicts
            .iter()
            .zip(&clusters)
            .filter(|(v, _)| !v.accepted)
            .flat_map(|(_, c)| csg.node(*c).blobs.iter().copied())
            .collect();
        debug!(
            "deghosting: {} of {} clusters rejected, {} blobs",
            verdicts.iter().filter(|v| !v.accepted).count(),
            verdicts.len(),
            rejected.len()
        );

        if self.cfg.dryrun {
            return Ok((eg.clone(), verdicts));
        }
        let (out, _) = eg.filtered(|v, _: &Node| !rejected.contains(&v), |_, _| true);
        debug!("deghosting out: {}", out.summary());
        Ok((out, verdicts))
    }

    /// Same-layer pass over the cluster shadow edges of each layer.
    fn layer_status(&self, csg: &ClusterShadowGraph, projections: &[ClusterProjection]) -> Vec<[LayerStatus; 3]> {
        let empty = Projection2D::empty(self.cfg.nchan, self.cfg.nslice);
        let mut out = vec![[LayerStatus::Absent; 3]; projections.len()];
        for component in csg.components() {
            for layer in WirePlaneLayer::ALL {
                for c in &component {
                    let Some(mine) = projections[c.index()].layer(layer) else {
                        continue;
                    };
                    let mut st = LayerStatus::Unique;
                    for peer in csg.neighbors_in(*c, layer) {
                        let theirs = projections[peer.index()].layer(layer).unwrap_or(&empty);
                        match judge_coverage(mine, theirs, self.cfg.uncertainty_cut) {
                            CoverageRelation::TarCoversRef => {
                                st = LayerStatus::Covered;
                                break;
                            }
                            CoverageRelation::RefEqTar => st = LayerStatus::Equal,
                            _ => {}
                        }
                    }
                    out[c.index()][layer.index()] = st;
                }
            }
        }
        out
    }

    /// Clusters covered under the tolerant comparison by a stronger peer
    /// they shadow in one layer, in every other layer both project onto.
    fn cross_layer_removal(&self, csg: &ClusterShadowGraph, projections: &[ClusterProjection]) -> FxHashSet<ClusterId> {
        let cut = self.cfg.uncertainty_cut;
        let alt = self.cfg.alt_cuts();
        let mut removed = FxHashSet::default();
        for component in csg.components() {
            for c in &component {
                let mine = &projections[c.index()];
                let beaten = WirePlaneLayer::ALL.iter().any(|layer| {
                    csg.neighbors_in(*c, *layer).into_iter().any(|peer| {
                        if removed.contains(&peer) {
                            return false;
                        }
                        let theirs = &projections[peer.index()];
                        if theirs.estimated_total_charge < mine.estimated_total_charge {
                            return false;
                        }
                        let mut shared = 0;
                        for other in WirePlaneLayer::ALL.iter().filter(|l| *l != layer) {
                            let (Some(p), Some(q)) = (theirs.layer(*other), mine.layer(*other)) else {
                                continue;
                            };
                            shared += 1;
                            if judge_coverage_alt(p, q, cut, alt) != CoverageRelation::RefCoversTar {
                                return false;
                            }
                        }
                        shared > 0
                    })
                });
                if beaten {
                    removed.insert(*c);
                }
            }
        }
        removed
    }

    fn verdict(
        &self,
        eg: &EventGraph,
        csg: &ClusterShadowGraph,
        c: ClusterId,
        proj: &ClusterProjection,
        layers: [LayerStatus; 3],
        removed: bool,
    ) -> Result<ClusterVerdict> {
        let unique_layers = layers.iter().filter(|s| **s == LayerStatus::Unique).count();
        let covered = layers.contains(&LayerStatus::Covered);
        let cuts = self.cfg.global_cuts();

        let (accepted, reason) = if removed {
            (false, VerdictReason::CrossLayer)
        } else if covered && unique_layers == 0 {
            (false, VerdictReason::Covered)
        } else if unique_layers >= cuts.len() {
            (true, VerdictReason::UniqueLayers)
        } else {
            let [nslices, low, high] = cuts[cuts.len() - 1 - unique_layers];
            let per_blob = proj.estimated_minimum_charge / proj.number_blobs.max(1) as f64;
            let threshold = if (proj.number_slices as f64) < nslices { low } else { high };
            (per_blob >= threshold, VerdictReason::ChargeCut)
        };

        let mut blobs = Vec::with_capacity(proj.number_blobs);
        for bv in &csg.node(c).blobs {
            blobs.push(eg.blob(*bv)?.ident);
        }
        blobs.sort_unstable();

        Ok(ClusterVerdict {
            cluster: c.index(),
            blobs,
            number_slices: proj.number_slices,
            estimated_total_charge: proj.estimated_total_charge,
            estimated_minimum_charge: proj.estimated_minimum_charge,
            layers,
            unique_layers,
            accepted,
            reason,
        })
    }
}
