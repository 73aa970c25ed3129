//! Centered Log-Ratio (CLR) transformation for compositional data.

use crate::data::CountTable;
use crate::error::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Pseudo-count added to every cell before taking logs.
pub const CLR_PSEUDOCOUNT: f64 = 1e-4;

/// Apply CLR to every sample row of a matrix (samples × taxa).
///
/// # Formula
/// For sample i: CLR(x_ij) = ln(x_ij + c) - mean_j(ln(x_ij + c)),
/// with c = [`CLR_PSEUDOCOUNT`].
pub fn clr_matrix(data: &DMatrix<f64>) -> DMatrix<f64> {
    let (n_samples, n_taxa) = data.shape();
    if n_taxa == 0 {
        return data.clone();
    }

    let log_data = data.map(|x| (x + CLR_PSEUDOCOUNT).ln());

    // mean(log(x)) per sample, i.e. log of the geometric mean
    let log_geometric_means: Vec<f64> = (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let row_sum: f64 = (0..n_taxa).map(|j| log_data[(i, j)]).sum();
            row_sum / n_taxa as f64
        })
        .collect();

    DMatrix::from_fn(n_samples, n_taxa, |i, j| {
        log_data[(i, j)] - log_geometric_means[i]
    })
}

/// Apply CLR to a count table or relative-abundance table.
pub fn to_clr(table: &CountTable) -> Result<CountTable> {
    table.with_data(clr_matrix(table.matrix()))
}
