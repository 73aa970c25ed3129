//! Huber regression, a linear model robust to outlying targets.
//!
//! Minimizes the joint objective in coefficients `w`, intercept `b` and
//! scale `σ`:
//!
//! ```text
//! Σ_i [ σ + H_ε((y_i - x_iᵀw - b) / σ) σ ] + α ‖w‖²
//! H_ε(z) = z²            if |z| ≤ ε
//!        = 2ε|z| - ε²    otherwise
//! ```
//!
//! Coefficients are found by iteratively reweighted ridge regression. The
//! scale has a closed-form update given the current residuals. When there
//! are more features than samples, each ridge step is solved in its dual
//! (samples × samples) form using a Gram matrix computed once per fit.

use crate::error::{CodarfeError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Residual threshold, in units of scale, where the loss turns linear.
pub const HUBER_EPSILON: f64 = 2.0;
/// L2 penalty on the coefficients.
pub const HUBER_ALPHA: f64 = 0.0003;

/// Iteration cap for the SVD fallback when Cholesky fails.
const SVD_MAX_ITERATIONS: usize = 10_000;

/// Configuration of a Huber regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HuberRegressor {
    /// Residual threshold in units of the scale estimate.
    pub epsilon: f64,
    /// L2 penalty on the coefficients (the intercept is not penalized).
    pub alpha: f64,
    /// Maximum number of reweighting iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the largest coefficient change.
    pub tol: f64,
}

impl Default for HuberRegressor {
    fn default() -> Self {
        Self {
            epsilon: HUBER_EPSILON,
            alpha: HUBER_ALPHA,
            max_iter: 100,
            tol: 1e-6,
        }
    }
}

/// A fitted Huber model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuberFit {
    /// One coefficient per feature column.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Final scale estimate σ.
    pub scale: f64,
    /// Iterations performed.
    pub n_iter: usize,
    /// Whether the tolerance was reached before `max_iter`.
    pub converged: bool,
}

impl HuberFit {
    /// Predict targets for a samples × features matrix.
    pub fn predict(&self, x: &DMatrix<f64>) -> Vec<f64> {
        let beta = DVector::from_column_slice(&self.coefficients);
        (x * beta).iter().map(|v| v + self.intercept).collect()
    }
}

impl HuberRegressor {
    /// Create a regressor with the default ε and α and the given iteration cap.
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            ..Default::default()
        }
    }

    /// Fit the model on a samples × features matrix.
    pub fn fit(&self, x: &DMatrix<f64>, y: &[f64]) -> Result<HuberFit> {
        let (n, p) = x.shape();
        if n == 0 || p == 0 {
            return Err(CodarfeError::EmptyData(
                "Cannot fit a regression on an empty matrix".to_string(),
            ));
        }
        if y.len() != n {
            return Err(CodarfeError::DimensionMismatch {
                expected: n,
                actual: y.len(),
            });
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(CodarfeError::Numerical(
                "Regression input contains non-finite values".to_string(),
            ));
        }

        let y = DVector::from_column_slice(y);
        let solver = RidgeSolver::new(x);

        // Scale floor keeps the penalty positive on near-perfect fits.
        let y_mean = y.mean();
        let y_spread = (y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        let sigma_floor = 1e-10 * y_spread.max(1.0);

        let mut weights = DVector::from_element(n, 1.0);
        let mut sigma = 1.0;
        let (mut beta, mut intercept) = solver.solve(&y, &weights, self.alpha * sigma)?;

        let mut n_iter = 0;
        let mut converged = false;
        while n_iter < self.max_iter {
            n_iter += 1;

            let residuals = &y - x * &beta - DVector::from_element(n, intercept);
            sigma = update_scale(&residuals, sigma, self.epsilon).max(sigma_floor);

            let threshold = self.epsilon * sigma;
            for (w, r) in weights.iter_mut().zip(residuals.iter()) {
                let abs_r = r.abs();
                *w = if abs_r <= threshold { 1.0 } else { threshold / abs_r };
            }

            let (new_beta, new_intercept) = solver.solve(&y, &weights, self.alpha * sigma)?;
            let delta = (&new_beta - &beta)
                .amax()
                .max((new_intercept - intercept).abs());
            let magnitude = new_beta.amax().max(new_intercept.abs()).max(1.0);
            beta = new_beta;
            intercept = new_intercept;

            if delta <= self.tol * magnitude {
                converged = true;
                break;
            }
        }

        Ok(HuberFit {
            coefficients: beta.iter().copied().collect(),
            intercept,
            scale: sigma,
            n_iter,
            converged,
        })
    }
}

/// Stationary point of the objective in σ for fixed residuals:
/// σ² = Σ_inliers r² / (n - ε² · n_outliers).
fn update_scale(residuals: &DVector<f64>, sigma: f64, epsilon: f64) -> f64 {
    let threshold = epsilon * sigma;
    let mut inlier_ss = 0.0;
    let mut n_outliers = 0usize;
    for r in residuals.iter() {
        if r.abs() <= threshold {
            inlier_ss += r * r;
        } else {
            n_outliers += 1;
        }
    }
    let denom = residuals.len() as f64 - epsilon * epsilon * n_outliers as f64;
    if denom > 0.0 && inlier_ss > 0.0 {
        (inlier_ss / denom).sqrt()
    } else {
        median_abs_deviation(residuals) / 0.6745
    }
}

fn median_abs_deviation(values: &DVector<f64>) -> f64 {
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let mid = abs.len() / 2;
    if abs.len() % 2 == 0 {
        (abs[mid - 1] + abs[mid]) / 2.0
    } else {
        abs[mid]
    }
}

/// Weighted ridge solver with an unpenalized intercept.
struct RidgeSolver<'a> {
    x: &'a DMatrix<f64>,
    /// X Xᵀ, present when the dual form is used.
    gram: Option<DMatrix<f64>>,
}

impl<'a> RidgeSolver<'a> {
    fn new(x: &'a DMatrix<f64>) -> Self {
        let (n, p) = x.shape();
        let gram = if p > n { Some(x * x.transpose()) } else { None };
        Self { x, gram }
    }

    /// Minimize Σ w_i (y_i - x_iᵀβ - b)² + λ‖β‖².
    fn solve(
        &self,
        y: &DVector<f64>,
        weights: &DVector<f64>,
        lambda: f64,
    ) -> Result<(DVector<f64>, f64)> {
        let x = self.x;
        let (n, p) = x.shape();
        let total_weight = weights.sum();
        if total_weight <= 0.0 {
            return Err(CodarfeError::Numerical(
                "Regression weights sum to zero".to_string(),
            ));
        }

        let x_bar = x.transpose() * weights / total_weight;
        let y_bar = y.dot(weights) / total_weight;
        let sqrt_w = weights.map(f64::sqrt);
        let y_tilde = DVector::from_fn(n, |i, _| sqrt_w[i] * (y[i] - y_bar));

        let beta = match &self.gram {
            None => {
                let mut z = x.clone();
                for j in 0..p {
                    for i in 0..n {
                        z[(i, j)] = sqrt_w[i] * (x[(i, j)] - x_bar[j]);
                    }
                }
                let mut a = z.transpose() * &z;
                for j in 0..p {
                    a[(j, j)] += lambda;
                }
                solve_symmetric(a, &(z.transpose() * &y_tilde))?
            }
            Some(gram) => {
                // Centered Gram: K̃ = G - m 1ᵀ - 1 mᵀ + (x̄ᵀx̄) 11ᵀ with m = X x̄.
                let m = x * &x_bar;
                let c = x_bar.dot(&x_bar);
                let mut k = DMatrix::from_fn(n, n, |i, j| {
                    sqrt_w[i] * (gram[(i, j)] - m[i] - m[j] + c) * sqrt_w[j]
                });
                for i in 0..n {
                    k[(i, i)] += lambda;
                }
                let a = solve_symmetric(k, &y_tilde)?;
                let sa = a.component_mul(&sqrt_w);
                // β = X̃ᵀ S a = Xᵀ(S a) - x̄ Σ(S a)
                x.transpose() * &sa - &x_bar * sa.sum()
            }
        };

        let intercept = y_bar - x_bar.dot(&beta);
        Ok((beta, intercept))
    }
}

fn solve_symmetric(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        return Ok(chol.solve(b));
    }
    a.try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| CodarfeError::Numerical("SVD of the ridge system did not converge".to_string()))?
        .solve(b, 1e-12)
        .map_err(|e| CodarfeError::Numerical(format!("Ridge system could not be solved: {}", e)))
}
