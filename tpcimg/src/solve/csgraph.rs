use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nalgebra::{Cholesky, DMatrix, DVector};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, trace, warn};

use tpccore::data::measurement::Measurement;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::{Node, NodeCode};

use crate::config::ChargeSolvingConfig;
use crate::error::{ImgError, Result};
use crate::solve::lasso::{self, LassoParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsKind {
    Meas,
    Blob,
}

/// Vertex of a charge solving graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CsNode {
    pub kind: CsKind,
    /// The event graph vertex this node stands for.
    pub orig: VertexId,
    pub ordering: i32,
    pub value: Measurement,
}

/// A connected blob-measure subgraph of one slice, solved independently.
#[derive(Clone, Debug, Default)]
pub struct CsGraph {
    pub slice: VertexId,
    pub slice_ident: i32,
    /// Position of this subgraph among those of its slice.
    pub index: usize,
    pub chi2_base: f64,
    pub chi2_l1: f64,
    pub converged: bool,
    pub iterations: usize,
    pub graph: UnGraph<CsNode, ()>,
}

impl CsGraph {
    fn empty_like(&self) -> CsGraph {
        CsGraph {
            slice: self.slice,
            slice_ident: self.slice_ident,
            index: self.index,
            ..CsGraph::default()
        }
    }

    /// Nodes of one kind sorted by their ordering key.
    pub fn select_ordered(&self, kind: CsKind) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| self.graph[*n].kind == kind)
            .collect();
        out.sort_by_key(|n| (self.graph[*n].ordering, self.graph[*n].orig));
        out
    }

    pub fn count(&self, kind: CsKind) -> usize {
        self.graph.node_weights().filter(|n| n.kind == kind).count()
    }

    pub fn total(&self, kind: CsKind) -> Measurement {
        self.graph.node_weights().filter(|n| n.kind == kind).map(|n| n.value).sum()
    }

    /// Copy without blobs valued below `threshold` and without measures left
    /// with no blob.
    pub fn prune(&self, threshold: f64) -> CsGraph {
        let g = &self.graph;
        let dropped: FxHashSet<NodeIndex> = g
            .node_indices()
            .filter(|n| g[*n].kind == CsKind::Blob && g[*n].value.value < threshold)
            .collect();
        let keep = |n: NodeIndex| -> bool {
            match g[n].kind {
                CsKind::Blob => !dropped.contains(&n),
                CsKind::Meas => g
                    .neighbors(n)
                    .any(|m| g[m].kind == CsKind::Blob && !dropped.contains(&m)),
            }
        };
        let graph = g.filter_map(|n, w| keep(n).then_some(*w), |_, e| Some(*e));
        CsGraph {
            graph,
            ..self.clone_header()
        }
    }

    fn clone_header(&self) -> CsGraph {
        CsGraph {
            slice: self.slice,
            slice_ident: self.slice_ident,
            index: self.index,
            chi2_base: self.chi2_base,
            chi2_l1: self.chi2_l1,
            converged: self.converged,
            iterations: self.iterations,
            graph: UnGraph::default(),
        }
    }
}

/// Bounds a measure must pass to take part in solving.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasureThreshold {
    /// Minimum value, ignored if <= 0.
    pub value: f64,
    /// Maximum uncertainty, ignored if <= 0.
    pub error: f64,
}

impl MeasureThreshold {
    pub fn accepts(&self, m: &Measurement) -> bool {
        let value_ok = self.value <= 0.0 || m.value >= self.value;
        let error_ok = self.error <= 0.0 || m.uncertainty <= self.error;
        value_ok && error_ok
    }
}

/// How a subgraph is modeled, in particular how a lone blob is valued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveProfile {
    /// A lone blob takes the plain mean of its measures.
    Simple,
    /// A lone blob takes the inverse-variance weighted mean of its measures
    /// when whitening, the least-squares value of the whitened system.
    Uboone,
}

impl FromStr for SolveProfile {
    type Err = ImgError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simple" => Ok(SolveProfile::Simple),
            "uboone" => Ok(SolveProfile::Uboone),
            other => Err(ImgError::config(format!("unknown solve config '{}'", other))),
        }
    }
}

impl fmt::Display for SolveProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveProfile::Simple => write!(f, "simple"),
            SolveProfile::Uboone => write!(f, "uboone"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveParams {
    pub profile: SolveProfile,
    pub whiten: bool,
    pub scale: f64,
    pub lasso: LassoParams,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            profile: SolveProfile::Uboone,
            whiten: true,
            scale: 1000.0,
            lasso: LassoParams::default(),
        }
    }
}

impl SolveParams {
    pub fn from_config(cfg: &ChargeSolvingConfig) -> Result<Self> {
        Ok(Self {
            profile: cfg.profile()?,
            whiten: cfg.whiten,
            scale: cfg.scale,
            lasso: LassoParams {
                lambda: cfg.lasso_lambda,
                tolerance: cfg.lasso_tolerance,
                minnorm: cfg.lasso_minnorm,
                max_iter: cfg.lasso_max_iter,
            },
        })
    }
}

/// Split the components of a slice graph into subgraphs.
fn connected_subgraphs(slice: VertexId, slice_ident: i32, graph: &UnGraph<CsNode, ()>) -> Vec<CsGraph> {
    let mut uf: UnionFind<usize> = UnionFind::new(graph.node_count());
    for e in graph.edge_references() {
        uf.union(e.source().index(), e.target().index());
    }
    let mut label: FxHashMap<usize, usize> = FxHashMap::default();
    let mut out: Vec<CsGraph> = Vec::new();
    let mut local: Vec<NodeIndex> = Vec::with_capacity(graph.node_count());
    for n in graph.node_indices() {
        let root = uf.find(n.index());
        let index = *label.entry(root).or_insert_with(|| {
            out.push(CsGraph {
                slice,
                slice_ident,
                index: out.len(),
                ..CsGraph::default()
            });
            out.len() - 1
        });
        local.push(out[index].graph.add_node(graph[n]));
    }
    for e in graph.edge_references() {
        let index = label[&uf.find(e.source().index())];
        out[index]
            .graph
            .add_edge(local[e.source().index()], local[e.target().index()], ());
    }
    out
}

/// Partition an event graph into independent blob-measure subgraphs.
///
/// # Description
///
/// Every blob must have exactly one slice, otherwise the event is rejected.
/// Per slice, each blob is joined to its measures that pass `threshold`.
/// Blobs without any passing measure are left out. Blob nodes carry the
/// blob's current charge, measure nodes the measure's summed signal; a
/// measure shared by several blobs appears once. The connected components of
/// each slice graph are returned in slice order.
///
pub fn unpack(eg: &EventGraph, threshold: &MeasureThreshold) -> Result<Vec<CsGraph>> {
    for bv in eg.vertices_of(NodeCode::Blob) {
        eg.slice_of(bv)?;
    }
    let mut out = Vec::new();
    for sv in eg.vertices_of(NodeCode::Slice) {
        let slice_ident = eg.slice(sv)?.ident;
        let mut graph: UnGraph<CsNode, ()> = UnGraph::default();
        let mut meas_nodes: FxHashMap<VertexId, NodeIndex> = FxHashMap::default();

        for bv in eg.neighbors_of(sv, NodeCode::Blob) {
            let blob = eg.blob(bv)?;
            let mut passing = Vec::new();
            for mv in eg.neighbors_of(bv, NodeCode::Measure) {
                let measure = eg.measure(mv)?;
                if threshold.accepts(&measure.value) {
                    passing.push((mv, measure.ordering_key(), measure.value));
                }
            }
            if passing.is_empty() {
                trace!("unpack: blob {} has no measure above threshold", blob.ident);
                continue;
            }
            let bn = graph.add_node(CsNode {
                kind: CsKind::Blob,
                orig: bv,
                ordering: blob.ordering_key(),
                value: blob.value,
            });
            for (mv, ordering, value) in passing {
                let mn = *meas_nodes.entry(mv).or_insert_with(|| {
                    graph.add_node(CsNode { kind: CsKind::Meas, orig: mv, ordering, value })
                });
                graph.update_edge(bn, mn, ());
            }
        }

        if graph.node_count() > 0 {
            out.extend(connected_subgraphs(sv, slice_ident, &graph));
        }
    }
    debug!("unpack: {} subgraphs", out.len());
    Ok(out)
}

/// Solve one subgraph for its blob charges.
///
/// # Description
///
/// Measures form the observation vector with a diagonal covariance of their
/// squared uncertainties, blob-measure edges the 0/1 response matrix. With
/// whitening the system is transformed by the Cholesky factor of the inverse
/// covariance. A lone blob takes the mean of its measures. Otherwise the
/// non-negative weighted lasso is run from the blobs' current values, using
/// their uncertainties as penalty weights.
///
/// The returned graph has the same nodes and edges; only blob values are
/// replaced. A whitened subgraph with zero total covariance yields an empty
/// graph.
///
/// # Arguments
///
/// * `csg` - The subgraph.
/// * `params` - Solve parameters.
///
pub fn solve(csg: &CsGraph, params: &SolveParams) -> Result<CsGraph> {
    let blobs = csg.select_ordered(CsKind::Blob);
    let meas = csg.select_ordered(CsKind::Meas);
    let mut out = csg.clone();
    if blobs.is_empty() || meas.is_empty() {
        return Ok(out);
    }
    let (nblob, nmeas) = (blobs.len(), meas.len());

    let measure = DVector::from_iterator(nmeas, meas.iter().map(|n| csg.graph[*n].value.value));
    let sigma: Vec<f64> = meas.iter().map(|n| csg.graph[*n].value.uncertainty).collect();

    if nblob == 1 && params.profile == SolveProfile::Simple {
        let value = measure.iter().mean();
        set_blob(&mut out, blobs[0], value);
        out.converged = true;
        return Ok(out);
    }

    if params.whiten {
        let total: f64 = sigma.iter().map(|s| s * s).sum();
        if total == 0.0 {
            debug!("solve: slice {} index {} has zero covariance", csg.slice_ident, csg.index);
            return Ok(csg.empty_like());
        }
        if let Some(bad) = sigma.iter().position(|s| !(*s > 0.0)) {
            let orig = csg.graph[meas[bad]].orig;
            return Err(ImgError::inconsistency(format!(
                "measure vertex {:?} has uncertainty {} under whitened solving",
                orig, sigma[bad]
            )));
        }
    }

    if nblob == 1 {
        let value = if params.whiten {
            let wsum: f64 = sigma.iter().map(|s| 1.0 / (s * s)).sum();
            measure.iter().zip(&sigma).map(|(m, s)| m / (s * s)).sum::<f64>() / wsum
        } else {
            measure.iter().mean()
        };
        set_blob(&mut out, blobs[0], value);
        out.converged = true;
        return Ok(out);
    }

    let bindex: FxHashMap<NodeIndex, usize> = blobs.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mindex: FxHashMap<NodeIndex, usize> = meas.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut response = DMatrix::<f64>::zeros(nmeas, nblob);
    for e in csg.graph.edge_references() {
        let (a, b) = (e.source(), e.target());
        let (bn, mn) = match (csg.graph[a].kind, csg.graph[b].kind) {
            (CsKind::Blob, CsKind::Meas) => (a, b),
            (CsKind::Meas, CsKind::Blob) => (b, a),
            _ => continue,
        };
        response[(mindex[&mn], bindex[&bn])] = 1.0;
    }

    let (x, y) = if params.whiten {
        let cov = DMatrix::from_diagonal(&DVector::from_iterator(nmeas, sigma.iter().map(|s| s * s)));
        let inverse = cov
            .try_inverse()
            .ok_or_else(|| ImgError::Numeric("measure covariance is singular".to_string()))?;
        let chol = Cholesky::new(inverse)
            .ok_or_else(|| ImgError::Numeric("inverse covariance is not positive definite".to_string()))?;
        let u = chol.l().transpose();
        (&u * &response, &u * &measure)
    } else {
        (response, measure)
    };
    let x = x * params.scale;

    let source = DVector::from_iterator(nblob, blobs.iter().map(|n| csg.graph[*n].value.value / params.scale));
    let weight = DVector::from_iterator(nblob, blobs.iter().map(|n| csg.graph[*n].value.uncertainty));

    let fit = lasso::solve(&x, &y, &params.lasso, Some(&source), Some(&weight));
    if !fit.converged {
        warn!(
            "solve: slice {} index {} did not converge after {} iterations",
            csg.slice_ident, csg.index, fit.iterations
        );
    }
    let predicted = lasso::predict(&x, &fit.beta);
    out.chi2_base = lasso::chi2_base(&y, &predicted);
    out.chi2_l1 = lasso::chi2_l1(&y, &fit.beta, params.lasso.lambda);
    out.converged = fit.converged;
    out.iterations = fit.iterations;
    for (i, n) in blobs.iter().enumerate() {
        set_blob(&mut out, *n, fit.beta[i] * params.scale);
    }
    trace!(
        "solve: slice {} index {} nblob={} nmeas={} chi2_base={:.3} chi2_l1={:.3}",
        csg.slice_ident,
        csg.index,
        nblob,
        nmeas,
        out.chi2_base,
        out.chi2_l1
    );
    Ok(out)
}

fn set_blob(csg: &mut CsGraph, n: NodeIndex, value: f64) {
    let node = &mut csg.graph[n];
    node.value = node.value.with_value(value);
}

/// Merge solved subgraphs back into a copy of the event graph.
///
/// # Description
///
/// Blob payloads are replaced by copies carrying their solved charge. Blobs
/// and measures that appear in no subgraph are dropped, and so are blobs and
/// measures left without any neighbor. Everything else is kept as is.
///
pub fn repack(eg: &EventGraph, csgs: &[CsGraph]) -> Result<EventGraph> {
    let mut live: FxHashSet<VertexId> = FxHashSet::default();
    let mut solved: Vec<(VertexId, Measurement)> = Vec::new();
    for csg in csgs {
        for node in csg.graph.node_weights() {
            live.insert(node.orig);
            if node.kind == CsKind::Blob {
                solved.push((node.orig, node.value));
            }
        }
    }

    let is_bm = |node: &Node| matches!(node.code(), NodeCode::Blob | NodeCode::Measure);
    let (mut out, map) = eg.filtered(|v, node| !is_bm(node) || live.contains(&v), |_, _| true);

    for (orig, value) in solved {
        let blob = eg.blob(orig)?;
        let nv = map
            .get(&orig)
            .copied()
            .ok_or_else(|| ImgError::inconsistency(format!("solved blob {} lost in repack", blob.ident)))?;
        out.set_node(nv, Node::Blob(Arc::new(blob.with_value(value))))?;
    }

    let (out, _) = out.filtered(|v, node| !is_bm(node) || !out.neighbors(v).is_empty(), |_, _| true);
    debug!("repack: {}", out.summary());
    Ok(out)
}
