//! Total Sum Scaling (TSS) to relative abundances.
//!
//! Each sample row is divided by its total so that the row sums to one.
//! Rows with a zero total are passed through unchanged.

use crate::data::CountTable;
use crate::error::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Convert every sample row of a matrix (samples × taxa) to proportions.
pub fn relative_abundance_matrix(data: &DMatrix<f64>) -> DMatrix<f64> {
    let (n_samples, n_taxa) = data.shape();

    let rows: Vec<Vec<f64>> = (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let total: f64 = (0..n_taxa).map(|j| data[(i, j)]).sum();
            (0..n_taxa)
                .map(|j| {
                    let value = data[(i, j)];
                    if total != 0.0 {
                        value / total
                    } else {
                        value
                    }
                })
                .collect()
        })
        .collect();

    DMatrix::from_fn(n_samples, n_taxa, |i, j| rows[i][j])
}

/// Apply total sum scaling to a count table.
///
/// # Formula
/// For sample i: RA(x_ij) = x_ij / sum_j(x_ij), when the sum is non-zero.
pub fn to_relative_abundance(table: &CountTable) -> Result<CountTable> {
    table.with_data(relative_abundance_matrix(table.matrix()))
}
