//! Pearson correlation.

use crate::error::{CodarfeError, Result};
use nalgebra::DMatrix;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Pearson correlation of two equally long slices.
///
/// NaN when either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Pearson correlation with a two-sided p-value from Student's t.
pub fn pearson_test(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.len() != b.len() {
        return Err(CodarfeError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.len() < 3 {
        return Err(CodarfeError::EmptyData(
            "At least three pairs are needed for a correlation test".to_string(),
        ));
    }

    let r = pearson(a, b);
    if r.is_nan() {
        return Ok((r, f64::NAN));
    }
    if r.abs() >= 1.0 {
        return Ok((r.clamp(-1.0, 1.0), 0.0));
    }

    let df = (a.len() - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| CodarfeError::Numerical(format!("t distribution: {}", e)))?;
    Ok((r, 2.0 * dist.sf(t.abs())))
}

/// Column-wise Pearson correlations between two matrices with the same rows.
///
/// Entry `(i, j)` is the correlation of column `i` of `a` with column `j`
/// of `b`: both sides are centered per column, `aᵀb` is divided by the
/// product of column norms. Zero-variance columns give NaN.
pub fn pairwise_correlation(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.nrows() != b.nrows() {
        return Err(CodarfeError::DimensionMismatch {
            expected: a.nrows(),
            actual: b.nrows(),
        });
    }

    let (am, a_norms) = center_columns(a);
    let (bm, b_norms) = center_columns(b);
    let mut corr = am.transpose() * bm;
    for j in 0..corr.ncols() {
        for i in 0..corr.nrows() {
            corr[(i, j)] /= a_norms[i] * b_norms[j];
        }
    }
    Ok(corr)
}

fn center_columns(m: &DMatrix<f64>) -> (DMatrix<f64>, Vec<f64>) {
    let mut centered = m.clone();
    let mut norms = Vec::with_capacity(m.ncols());
    for mut column in centered.column_iter_mut() {
        let mean = column.mean();
        column.add_scalar_mut(-mean);
        norms.push(column.norm());
    }
    (centered, norms)
}
