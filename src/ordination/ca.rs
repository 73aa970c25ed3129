//! Correspondence analysis.
//!
//! Decomposes the chi-square contributions of a non-negative samples ×
//! features table with a thin SVD (Legendre & Legendre 1998, §9.4.1).
//! Scaling 1 preserves chi-square distances between samples; scaling 2
//! preserves them between features.

use crate::error::{CodarfeError, Result};
use nalgebra::{DMatrix, DVector};

/// Iteration cap for the SVD of the residual matrix.
const SVD_MAX_ITERATIONS: usize = 10_000;

/// Which chi-square distances the scores preserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// Distances between samples (rows).
    Samples,
    /// Distances between features (columns).
    Features,
}

/// Output of a correspondence analysis, axes ordered by eigenvalue.
#[derive(Debug, Clone)]
pub struct CaResult {
    /// Squared singular values of the retained axes.
    pub eigenvalues: Vec<f64>,
    /// Samples × axes.
    pub sample_scores: DMatrix<f64>,
    /// Features × axes.
    pub feature_scores: DMatrix<f64>,
}

impl CaResult {
    pub fn n_axes(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Share of the total inertia carried by each axis.
    pub fn proportion_explained(&self) -> Vec<f64> {
        let total: f64 = self.eigenvalues.iter().sum();
        self.eigenvalues.iter().map(|e| e / total).collect()
    }
}

/// Number of singular values above `max(S) · max(shape) · ε`.
pub fn svd_rank(shape: (usize, usize), singular_values: &[f64]) -> usize {
    let s_max = singular_values.iter().copied().fold(0.0, f64::max);
    let tol = s_max * shape.0.max(shape.1) as f64 * f64::EPSILON;
    singular_values.iter().filter(|&&s| s > tol).count()
}

/// Run correspondence analysis on a non-negative samples × features table.
pub fn correspondence_analysis(x: &DMatrix<f64>, scaling: Scaling) -> Result<CaResult> {
    let (r, c) = x.shape();
    if r < 2 || c < 2 {
        return Err(CodarfeError::EmptyData(
            "Correspondence analysis needs at least two rows and two columns".to_string(),
        ));
    }
    if x.iter().any(|&v| !(v >= 0.0)) {
        return Err(CodarfeError::Numerical(
            "Correspondence analysis requires non-negative finite values".to_string(),
        ));
    }
    let grand_total = x.sum();
    if !(grand_total > 0.0) || !grand_total.is_finite() {
        return Err(CodarfeError::Numerical(
            "Correspondence analysis requires a positive finite total".to_string(),
        ));
    }

    let q = x / grand_total;
    let row_marginals: DVector<f64> = q.column_sum();
    let column_marginals: DVector<f64> = q.row_sum().transpose();
    if row_marginals.iter().chain(column_marginals.iter()).any(|&m| m <= 0.0) {
        return Err(CodarfeError::Numerical(
            "Correspondence analysis requires every row and column to have a positive sum".to_string(),
        ));
    }

    let q_bar = DMatrix::from_fn(r, c, |i, j| {
        let expected = row_marginals[i] * column_marginals[j];
        (q[(i, j)] - expected) / expected.sqrt()
    });

    let svd = q_bar
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| CodarfeError::Numerical("SVD did not converge".to_string()))?;
    let (u_hat, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(CodarfeError::Numerical(
                "SVD did not return singular vectors".to_string(),
            ))
        }
    };

    let mut axes: Vec<usize> = (0..svd.singular_values.len()).collect();
    axes.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    let singular: Vec<f64> = axes.iter().map(|&a| svd.singular_values[a]).collect();
    let rank = svd_rank((r, c), &singular);
    if rank == 0 {
        return Err(CodarfeError::Numerical(
            "Table has no structure to ordinate".to_string(),
        ));
    }
    let axes = &axes[..rank];
    let w = &singular[..rank];

    // V: column-marginal scaled right vectors; V_hat: row-marginal scaled left vectors.
    let v = DMatrix::from_fn(c, rank, |j, a| v_t[(axes[a], j)] / column_marginals[j].sqrt());
    let v_hat = DMatrix::from_fn(r, rank, |i, a| u_hat[(i, axes[a])] / row_marginals[i].sqrt());

    let (sample_scores, feature_scores) = match scaling {
        Scaling::Samples => {
            let f = DMatrix::from_fn(r, rank, |i, a| v_hat[(i, a)] * w[a]);
            (f, v)
        }
        Scaling::Features => {
            let f_hat = DMatrix::from_fn(c, rank, |j, a| v[(j, a)] * w[a]);
            (v_hat, f_hat)
        }
    };

    Ok(CaResult {
        eigenvalues: w.iter().map(|s| s * s).collect(),
        sample_scores,
        feature_scores,
    })
}

/// Order points by their angle around the centroid of the first two axes.
pub fn angular_order(scores: &DMatrix<f64>) -> Result<Vec<usize>> {
    if scores.ncols() < 2 {
        return Err(CodarfeError::Numerical(format!(
            "Angular ordering needs two axes, got {}",
            scores.ncols()
        )));
    }
    let xc = scores.column(0).mean();
    let yc = scores.column(1).mean();

    let theta: Vec<f64> = (0..scores.nrows())
        .map(|i| (scores[(i, 1)] - yc).atan2(scores[(i, 0)] - xc))
        .collect();
    let mut order: Vec<usize> = (0..theta.len()).collect();
    order.sort_by(|&a, &b| theta[a].total_cmp(&theta[b]));
    Ok(order)
}
