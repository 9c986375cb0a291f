use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use tpccore::graph::event::EventGraph;
use tpccore::graph::node::NodeCode;

use crate::error::{ImgError, Result};
use crate::solve::csgraph::{CsGraph, CsKind};

/// Neighbor blobs below this charge do not count as connected for `uboone`.
pub const UBOONE_CONNECTED_CHARGE: f64 = 300.0;

/// Sets the lasso penalty weight, stored as blob uncertainty, before a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingStrategy {
    /// Weight 9 for every blob.
    Uniform,
    /// Number of distinct slices among the blob and its blob neighbors.
    Simple,
    /// 9, divided by 3 for a connected blob in a later slice and by 3 again
    /// for one in an earlier slice.
    Uboone,
}

impl WeightingStrategy {
    /// Write the weights into the blob nodes of `csg`, looking up blob-blob
    /// connectivity in the event graph the subgraph was unpacked from.
    pub fn apply(&self, eg: &EventGraph, csg: &mut CsGraph) -> Result<()> {
        let center = eg.slice(csg.slice)?.start;
        let nodes: Vec<_> = csg.select_ordered(CsKind::Blob);
        for n in nodes {
            let orig = csg.graph[n].orig;
            let weight = match self {
                WeightingStrategy::Uniform => 9.0,
                WeightingStrategy::Simple => {
                    let mut slices = FxHashSet::default();
                    slices.insert(csg.slice_ident);
                    for nb in eg.neighbors_of(orig, NodeCode::Blob) {
                        slices.insert(eg.blob(nb)?.slice.ident);
                    }
                    slices.len() as f64
                }
                WeightingStrategy::Uboone => {
                    let (mut prev, mut next) = (false, false);
                    for nb in eg.neighbors_of(orig, NodeCode::Blob) {
                        let blob = eg.blob(nb)?;
                        if blob.value.value < UBOONE_CONNECTED_CHARGE {
                            continue;
                        }
                        let time = blob.slice.start;
                        next |= time > center;
                        prev |= time < center;
                    }
                    let mut weight = 9.0;
                    if next {
                        weight /= 3.0;
                    }
                    if prev {
                        weight /= 3.0;
                    }
                    weight
                }
            };
            let node = &mut csg.graph[n];
            node.value = node.value.with_uncertainty(weight);
        }
        Ok(())
    }
}

impl FromStr for WeightingStrategy {
    type Err = ImgError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(WeightingStrategy::Uniform),
            "simple" => Ok(WeightingStrategy::Simple),
            "uboone" => Ok(WeightingStrategy::Uboone),
            other => Err(ImgError::config(format!("unknown weighting strategy '{}'", other))),
        }
    }
}

impl fmt::Display for WeightingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingStrategy::Uniform => write!(f, "uniform"),
            WeightingStrategy::Simple => write!(f, "simple"),
            WeightingStrategy::Uboone => write!(f, "uboone"),
        }
    }
}
