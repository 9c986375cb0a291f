use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::clustering::policy::ClusteringPolicy;
use crate::error::{ImgError, Result};
use crate::solve::csgraph::SolveProfile;
use crate::solve::weighting::WeightingStrategy;

/// Parse a configuration struct from JSON and validate it.
fn parse<T: DeserializeOwned + Validate>(json: &str) -> Result<T> {
    let cfg: T = serde_json::from_str(json)?;
    cfg.validate()?;
    Ok(cfg)
}

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Options of the charge solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeSolvingConfig {
    /// Measures with a smaller value are not used, disabled if <= 0.
    pub meas_value_threshold: f64,
    /// Measures with a larger uncertainty are not used, disabled if <= 0.
    pub meas_error_threshold: f64,
    /// Solved blobs below this value are pruned after every round.
    pub blob_value_threshold: f64,

    pub lasso_tolerance: f64,
    pub lasso_minnorm: f64,
    pub lasso_lambda: f64,
    pub lasso_max_iter: usize,

    /// Names of the weighting rounds, run in order.
    pub weighting_strategies: Vec<String>,
    /// Name of the solve profile, "simple" or "uboone".
    pub solve_config: String,
    pub whiten: bool,
    /// Charge unit the lasso solves in.
    pub scale: f64,
}

impl Default for ChargeSolvingConfig {
    fn default() -> Self {
        Self {
            meas_value_threshold: 10.0,
            meas_error_threshold: 1e9,
            blob_value_threshold: 0.0,
            lasso_tolerance: 1e-3,
            lasso_minnorm: 1e-6,
            lasso_lambda: 1.0,
            lasso_max_iter: 100_000,
            weighting_strategies: vec!["uniform".to_string()],
            solve_config: "uboone".to_string(),
            whiten: true,
            scale: 1000.0,
        }
    }
}

impl ChargeSolvingConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        parse(json)
    }

    pub fn strategies(&self) -> Result<Vec<WeightingStrategy>> {
        self.weighting_strategies.iter().map(|s| s.parse()).collect()
    }

    pub fn profile(&self) -> Result<SolveProfile> {
        self.solve_config.parse()
    }
}

impl Validate for ChargeSolvingConfig {
    fn validate(&self) -> Result<()> {
        self.strategies()?;
        self.profile()?;
        if self.weighting_strategies.is_empty() {
            return Err(ImgError::config("no weighting strategy given"));
        }
        if !(self.lasso_tolerance > 0.0) {
            return Err(ImgError::config(format!("lasso_tolerance must be positive, got {}", self.lasso_tolerance)));
        }
        if self.lasso_minnorm < 0.0 || self.lasso_lambda < 0.0 {
            return Err(ImgError::config("lasso_minnorm and lasso_lambda must not be negative"));
        }
        if self.lasso_max_iter == 0 {
            return Err(ImgError::config("lasso_max_iter must be at least 1"));
        }
        if !(self.scale > 0.0) {
            return Err(ImgError::config(format!("scale must be positive, got {}", self.scale)));
        }
        Ok(())
    }
}

/// Options of the projection deghoster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeghostConfig {
    /// Shadow granularity, 'w' for wires or 'c' for channels.
    pub shadow_type: char,
    pub nchan: usize,
    pub nslice: usize,
    /// Channels with a larger uncertainty are dead.
    pub uncertainty_cut: f64,
    /// Charge stored in dead cells.
    pub dead_default_charge: f64,
    /// Row length of `global_cut_values`.
    pub global_cut_nparas: usize,
    /// One row (slices, charge per blob below, charge per blob above) per
    /// number of uniquely retained layers, the last row for zero.
    pub global_cut_values: Vec<f64>,
    pub judge_alt_cut_values: Vec<f64>,
    /// Compute verdicts but return the input graph.
    pub dryrun: bool,
}

impl Default for DeghostConfig {
    fn default() -> Self {
        Self {
            shadow_type: 'w',
            nchan: 8256,
            nslice: 9592,
            uncertainty_cut: 1e11,
            dead_default_charge: -1e12,
            global_cut_nparas: 3,
            global_cut_values: vec![3.0, 3000.0, 2000.0, 8.0, 8000.0, 4000.0, 8.0, 8000.0, 6000.0],
            judge_alt_cut_values: vec![0.05, 0.33, 0.15, 0.33],
            dryrun: false,
        }
    }
}

impl DeghostConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        parse(json)
    }

    /// Cut rows as (slices, low count cut, high count cut).
    pub fn global_cuts(&self) -> Vec<[f64; 3]> {
        if self.global_cut_nparas < 3 {
            return Vec::new();
        }
        self.global_cut_values
            .chunks_exact(self.global_cut_nparas)
            .map(|row| [row[0], row[1], row[2]])
            .collect()
    }

    pub fn alt_cuts(&self) -> [f64; 4] {
        let mut cuts = [0.0; 4];
        for (c, v) in cuts.iter_mut().zip(&self.judge_alt_cut_values) {
            *c = *v;
        }
        cuts
    }
}

impl Validate for DeghostConfig {
    fn validate(&self) -> Result<()> {
        if self.shadow_type != 'w' && self.shadow_type != 'c' {
            return Err(ImgError::config(format!("unknown shadow type '{}'", self.shadow_type)));
        }
        if self.global_cut_nparas < 3 {
            return Err(ImgError::config(format!(
                "global_cut_nparas must be at least 3, got {}",
                self.global_cut_nparas
            )));
        }
        if self.global_cut_values.is_empty() || self.global_cut_values.len() % self.global_cut_nparas != 0 {
            return Err(ImgError::config(format!(
                "global_cut_values holds {} values, not a multiple of {}",
                self.global_cut_values.len(),
                self.global_cut_nparas
            )));
        }
        if self.judge_alt_cut_values.len() != 4 {
            return Err(ImgError::config(format!(
                "judge_alt_cut_values needs 4 values, got {}",
                self.judge_alt_cut_values.len()
            )));
        }
        if self.nchan == 0 || self.nslice == 0 {
            return Err(ImgError::config("projection dimensions must be positive"));
        }
        Ok(())
    }
}

/// Options of the geometric clustering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeomClusteringConfig {
    pub policy: String,
}

impl Default for GeomClusteringConfig {
    fn default() -> Self {
        Self { policy: "uboone".to_string() }
    }
}

impl GeomClusteringConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        parse(json)
    }

    pub fn policy(&self) -> Result<ClusteringPolicy> {
        self.policy.parse()
    }
}

impl Validate for GeomClusteringConfig {
    fn validate(&self) -> Result<()> {
        self.policy().map(|_| ())
    }
}
