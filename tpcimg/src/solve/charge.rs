use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use tpccore::graph::event::EventGraph;

use crate::config::{ChargeSolvingConfig, Validate};
use crate::error::Result;
use crate::solve::csgraph::{repack, solve, unpack, CsGraph, CsKind, MeasureThreshold, SolveParams};
use crate::solve::weighting::WeightingStrategy;

/// Diagnostics of one solved subgraph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolveSummary {
    pub slice: i32,
    pub index: usize,
    pub nblob: usize,
    pub nmeas: usize,
    pub blob_charge: f64,
    pub meas_charge: f64,
    pub chi2_base: f64,
    pub chi2_l1: f64,
    pub converged: bool,
    pub iterations: usize,
}

impl From<&CsGraph> for SolveSummary {
    fn from(csg: &CsGraph) -> Self {
        SolveSummary {
            slice: csg.slice_ident,
            index: csg.index,
            nblob: csg.count(CsKind::Blob),
            nmeas: csg.count(CsKind::Meas),
            blob_charge: csg.total(CsKind::Blob).value,
            meas_charge: csg.total(CsKind::Meas).value,
            chi2_base: csg.chi2_base,
            chi2_l1: csg.chi2_l1,
            converged: csg.converged,
            iterations: csg.iterations,
        }
    }
}

/// Solves the blob charges of an event graph.
///
/// Unpacks the graph into blob-measure subgraphs, then for every weighting
/// strategy in turn weights, solves and prunes each subgraph, and finally
/// repacks the solved charges into a copy of the graph. Subgraphs are solved
/// in parallel.
#[derive(Clone, Debug)]
pub struct ChargeSolving {
    threshold: MeasureThreshold,
    blob_threshold: f64,
    strategies: Vec<WeightingStrategy>,
    params: SolveParams,
}

impl ChargeSolving {
    pub fn new(cfg: &ChargeSolvingConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(ChargeSolving {
            threshold: MeasureThreshold {
                value: cfg.meas_value_threshold,
                error: cfg.meas_error_threshold,
            },
            blob_threshold: cfg.blob_value_threshold,
            strategies: cfg.strategies()?,
            params: SolveParams::from_config(cfg)?,
        })
    }

    pub fn params(&self) -> &SolveParams {
        &self.params
    }

    /// Solve the subgraphs of `eg` without repacking.
    pub fn solve_subgraphs(&self, eg: &EventGraph) -> Result<Vec<CsGraph>> {
        let mut csgs = unpack(eg, &self.threshold)?;
        for strategy in &self.strategies {
            debug!("charge solving: strategy={} on {} subgraphs", strategy, csgs.len());
            csgs = csgs
                .into_par_iter()
                .map(|mut csg| -> Result<CsGraph> {
                    strategy.apply(eg, &mut csg)?;
                    let solved = solve(&csg, &self.params)?;
                    Ok(solved.prune(self.blob_threshold))
                })
                .collect::<Result<Vec<CsGraph>>>()?;
        }
        Ok(csgs)
    }

    /// Run the full solve and return the repacked graph with per subgraph
    /// diagnostics.
    pub fn run(&self, eg: &EventGraph) -> Result<(EventGraph, Vec<SolveSummary>)> {
        debug!("charge solving in: {}", eg.summary());
        let csgs = self.solve_subgraphs(eg)?;
        let summaries: Vec<SolveSummary> = csgs.iter().map(SolveSummary::from).collect();
        let out = repack(eg, &csgs)?;
        debug!(
            "charge solving out: {} from {} subgraphs over {} strategies",
            out.summary(),
            csgs.len(),
            self.strategies.len()
        );
        Ok((out, summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImgError;

    #[test]
    fn test_rejects_bad_config() {
        let cfg = ChargeSolvingConfig { solve_config: "exact".to_string(), ..ChargeSolvingConfig::default() };
        assert!(matches!(ChargeSolving::new(&cfg), Err(ImgError::Config(_))));
    }

    #[test]
    fn test_empty_event() {
        let cs = ChargeSolving::new(&ChargeSolvingConfig::default()).unwrap();
        let (out, summaries) = cs.run(&EventGraph::new()).unwrap();
        assert_eq!(out.node_count(), 0);
        assert!(summaries.is_empty());
    }
}
