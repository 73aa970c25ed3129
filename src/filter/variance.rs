//! Variance-based filtering of taxa.

use crate::data::CountTable;
use crate::error::{CodarfeError, Result};
use log::info;
use rayon::prelude::*;

/// Divisor applied to the mean taxon variance to obtain the cut-off.
pub const LOW_VARIANCE_DIVISOR: f64 = 8.0;

/// Result of low-variance filtering.
#[derive(Debug, Clone)]
pub struct VarianceFilterResult {
    /// The filtered table.
    pub table: CountTable,
    /// Variance cut-off that was applied.
    pub threshold: f64,
    /// Names of removed taxa.
    pub removed: Vec<String>,
}

/// Remove taxa whose variance is very low relative to the rest of the table.
///
/// The cut-off is the mean sample variance (ddof = 1) across taxa divided by
/// [`LOW_VARIANCE_DIVISOR`]. A taxon is kept when its population variance
/// (ddof = 0) is strictly above the cut-off.
pub fn remove_low_variance(table: &CountTable) -> Result<VarianceFilterResult> {
    let n_samples = table.n_samples();
    let n_taxa = table.n_taxa();
    if n_samples == 0 || n_taxa == 0 {
        return Err(CodarfeError::EmptyData(
            "Cannot filter an empty table".to_string(),
        ));
    }

    // (population variance, sample variance) per taxon
    let variances: Vec<(f64, f64)> = (0..n_taxa)
        .into_par_iter()
        .map(|j| {
            let column = table.column(j);
            let mean = column.iter().sum::<f64>() / n_samples as f64;
            let ss: f64 = column.iter().map(|x| (x - mean).powi(2)).sum();
            let sample_var = if n_samples > 1 {
                ss / (n_samples - 1) as f64
            } else {
                f64::NAN
            };
            (ss / n_samples as f64, sample_var)
        })
        .collect();

    let threshold =
        variances.iter().map(|(_, s)| s).sum::<f64>() / n_taxa as f64 / LOW_VARIANCE_DIVISOR;

    let keep: Vec<usize> = (0..n_taxa)
        .filter(|&j| variances[j].0 > threshold)
        .collect();

    if keep.is_empty() {
        return Err(CodarfeError::EmptyData(format!(
            "No taxa have variance above {:.3e}",
            threshold
        )));
    }

    let removed: Vec<String> = (0..n_taxa)
        .filter(|&j| variances[j].0 <= threshold)
        .map(|j| table.taxa()[j].clone())
        .collect();
    info!(
        "A total of {} predictors were removed due to very low variance",
        removed.len()
    );

    Ok(VarianceFilterResult {
        table: table.subset_taxa(&keep)?,
        threshold,
        removed,
    })
}
