use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Knobs of the L1 regularized fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LassoParams {
    pub lambda: f64,
    pub tolerance: f64,
    /// Floor of a column's squared norm.
    pub minnorm: f64,
    pub max_iter: usize,
}

impl Default for LassoParams {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            tolerance: 1e-3,
            minnorm: 1e-6,
            max_iter: 100_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LassoFit {
    pub beta: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Non-negative weighted lasso by cyclic coordinate descent.
///
/// # Description
///
/// Minimizes `0.5 * |y - X b|^2 + lambda * sum_j w_j |b_j|` subject to
/// `b >= 0`. Sweeps stop once the squared change of `b` over one sweep drops
/// below `tolerance^2 * nbeta`, or after `max_iter` sweeps with `converged`
/// left false.
///
/// # Arguments
///
/// * `x` - Response matrix, one row per measure, one column per unknown.
/// * `y` - Measured values.
/// * `params` - Fit parameters.
/// * `initial` - Starting point, zeros if `None`.
/// * `weights` - Per unknown penalty weights, ones if `None`.
///
/// # Examples
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use tpcimg::solve::lasso::{solve, LassoParams};
///
/// let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
/// let y = DVector::from_vec(vec![2.0, 3.0, 5.0]);
/// let params = LassoParams { lambda: 1e-9, tolerance: 1e-9, ..LassoParams::default() };
/// let fit = solve(&x, &y, &params, None, None);
/// assert!(fit.converged);
/// assert!((fit.beta[0] - 2.0).abs() < 1e-6);
/// assert!((fit.beta[1] - 3.0).abs() < 1e-6);
/// ```
pub fn solve(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    params: &LassoParams,
    initial: Option<&DVector<f64>>,
    weights: Option<&DVector<f64>>,
) -> LassoFit {
    let nbeta = x.ncols();
    let mut beta = match initial {
        Some(b) if b.len() == nbeta => b.map(|v| v.max(0.0)),
        _ => DVector::zeros(nbeta),
    };
    if nbeta == 0 {
        return LassoFit { beta, iterations: 0, converged: true };
    }

    let norms: Vec<f64> = (0..nbeta)
        .map(|j| x.column(j).norm_squared().max(params.minnorm))
        .collect();
    let penalty: Vec<f64> = (0..nbeta)
        .map(|j| params.lambda * weights.and_then(|w| w.get(j).copied()).unwrap_or(1.0))
        .collect();

    let mut residual = y - x * &beta;
    let tol2 = params.tolerance * params.tolerance * nbeta as f64;

    for iteration in 1..=params.max_iter {
        let mut change = 0.0;
        for j in 0..nbeta {
            let col = x.column(j);
            let old = beta[j];
            let rho = col.dot(&residual) + norms[j] * old;
            let new = ((rho - penalty[j]) / norms[j]).max(0.0);
            if new != old {
                residual.axpy(old - new, &col, 1.0);
                beta[j] = new;
                change += (new - old) * (new - old);
            }
        }
        if change < tol2 {
            return LassoFit { beta, iterations: iteration, converged: true };
        }
    }

    LassoFit { beta, iterations: params.max_iter, converged: false }
}

/// Predicted measures `X b`.
pub fn predict(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    x * beta
}

/// Data term of the objective, `|y - X b|^2`.
pub fn chi2_base(y: &DVector<f64>, predicted: &DVector<f64>) -> f64 {
    (y - predicted).norm_squared()
}

/// Regularization term as reported in diagnostics, `2 lambda |b|_1 N`.
pub fn chi2_l1(y: &DVector<f64>, beta: &DVector<f64>, lambda: f64) -> f64 {
    2.0 * lambda * beta.lp_norm(1) * y.len() as f64
}
